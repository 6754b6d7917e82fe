pub mod charm;
