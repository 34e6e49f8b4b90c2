pub mod jigsaw;
