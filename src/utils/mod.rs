pub mod text_extract;
