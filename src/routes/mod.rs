pub mod carte_grise;
pub mod ocr;
