//! Error types reported by dataset construction, sampler construction, and
//! the Gibbs loop.

use thiserror::Error;

/// Errors surfaced by the public sampler interface.
///
/// Construction-time variants reject caller misuse before any sampling
/// happens; the runtime variants report states the sampler cannot recover
/// from, and always stop the Gibbs loop at a sample boundary.
#[derive(Debug, Error)]
pub enum XBartError {
    /// The outcome vector and covariate matrix disagree on the number of rows.
    #[error("outcome has {y_len} entries but covariates have {x_rows} rows")]
    OutcomeLengthMismatch {
        /// Number of covariate rows.
        x_rows: usize,
        /// Number of outcome entries.
        y_len: usize,
    },

    /// A covariate value is NaN or infinite.
    #[error("covariate at row {row}, column {col} is not finite")]
    NonFiniteCovariate {
        /// Offending row.
        row: usize,
        /// Offending column.
        col: usize,
    },

    /// The per-column feature type tags do not cover every column.
    #[error("{found} feature types supplied for {expected} covariate columns")]
    FeatureTypeCountMismatch {
        /// Number of covariate columns.
        expected: usize,
        /// Number of feature types supplied.
        found: usize,
    },

    /// A categorical column holds a value that is not a non-negative integer code.
    #[error("categorical column {col} holds an invalid code at row {row}")]
    InvalidCategoryCode {
        /// Offending row.
        row: usize,
        /// Offending column.
        col: usize,
    },

    /// The basis matrix and covariate matrix disagree on the number of rows.
    #[error("basis has {basis_rows} rows but covariates have {x_rows} rows")]
    BasisRowMismatch {
        /// Number of covariate rows.
        x_rows: usize,
        /// Number of basis rows.
        basis_rows: usize,
    },

    /// The basis matrix has no columns.
    #[error("leaf regression basis must have at least one column")]
    EmptyBasis,

    /// The leaf model requires a basis the dataset does not carry, or the
    /// basis width disagrees with the leaf prior.
    #[error("leaf model expects a basis of width {expected}, dataset has {found}")]
    BasisDimensionMismatch {
        /// Basis width the leaf model was configured for.
        expected: usize,
        /// Basis width the dataset carries.
        found: usize,
    },

    /// The variable-weight vector does not cover every covariate.
    #[error("{found} variable weights supplied for {expected} covariate columns")]
    VariableWeightCountMismatch {
        /// Number of covariate columns.
        expected: usize,
        /// Number of weights supplied.
        found: usize,
    },

    /// Variable weights must be non-negative and sum to a positive value.
    #[error("variable weights must be non-negative with a positive sum")]
    InvalidVariableWeights,

    /// A scalar hyperparameter that must be positive is not.
    #[error("{name} must be positive, got {value}")]
    NonPositiveParameter {
        /// Parameter name.
        name: &'static str,
        /// Value supplied.
        value: f64,
    },

    /// A scalar hyperparameter lies outside its valid range.
    #[error("{name} is outside its valid range, got {value}")]
    ParameterOutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Value supplied.
        value: f64,
    },

    /// The multivariate leaf prior scale is not symmetric positive definite.
    #[error("leaf prior scale matrix is not positive definite")]
    LeafScaleNotPositiveDefinite,

    /// A leaf-scale prior was supplied for a leaf model that has no scalar
    /// leaf scale to update.
    #[error("leaf-scale prior applies only to the constant leaf model")]
    LeafScalePriorUnsupported,

    /// The residual vector no longer matches the outcome vector.
    #[error("residual has {found} entries but outcome has {expected}")]
    ResidualLengthMismatch {
        /// Expected length (N).
        expected: usize,
        /// Observed length.
        found: usize,
    },

    /// Neither grow nor prune is structurally possible for a tree.
    #[error("neither grow nor prune is possible for tree {tree}")]
    EmptyMoveSet {
        /// Index of the affected tree.
        tree: usize,
    },

    /// A split rewrite produced an empty child node.
    #[error("split of node {node} produced an empty child")]
    EmptyChild {
        /// Node whose split failed.
        node: usize,
    },

    /// A serialised document could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
