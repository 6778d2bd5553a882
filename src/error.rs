use thiserror::Error;

pub type PriceEditorResult<T> = Result<T, PriceEditorError>;

#[derive(Error, Debug)]
pub enum PriceEditorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not load workbook: {0}")]
    Load(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Could not save workbook: {0}")]
    Save(String),

    #[error("Could not export CSV: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PriceEditorError {
    /// Short machine-readable kind, used in JSON responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PriceEditorError::Io(_) => "io_error",
            PriceEditorError::Load(_) => "load_error",
            PriceEditorError::Validation(_) => "validation_error",
            PriceEditorError::Save(_) => "save_error",
            PriceEditorError::Export(_) => "export_error",
            PriceEditorError::Config(_) => "config_error",
        }
    }
}
