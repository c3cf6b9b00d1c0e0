use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("numerical instability: non-finite position for module '{module}' at iteration {iteration}")]
    NumericalInstability { module: String, iteration: usize },
}
