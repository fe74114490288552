use std::fmt;

#[derive(Debug)]
pub enum DedupError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad weight, inverted thresholds, etc.).
    ConfigValidation(String),
    /// No comparison column was bound.
    NoColumnsSelected,
    /// A bound column does not exist in one of the datasets.
    MissingColumn { dataset: String, column: String },
    /// Input data could not be read into a dataset.
    DataParse { dataset: String, message: String },
}

impl fmt::Display for DedupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::NoColumnsSelected => {
                write!(f, "no comparison column selected (bind at least one of name, mobile, address, extra)")
            }
            Self::MissingColumn { dataset, column } => {
                write!(f, "{dataset}: missing column '{column}'")
            }
            Self::DataParse { dataset, message } => {
                write!(f, "{dataset}: cannot read data: {message}")
            }
        }
    }
}

impl std::error::Error for DedupError {}
