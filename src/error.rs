use std::fmt;
use thiserror::Error;

/// The step of an install run that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Fetch,
    Extract,
    Install,
    Register,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Install => "install",
            Stage::Register => "register",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{stage} stage failed: {cause:#}")]
    Stage { stage: Stage, cause: anyhow::Error },

    #[error("interrupted; temporary files were removed")]
    Interrupted,
}

impl InstallError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            InstallError::Stage { stage, .. } => Some(*stage),
            InstallError::Interrupted => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            InstallError::Stage { .. } => 1,
            InstallError::Interrupted => 130,
        }
    }
}

pub trait StageContext<T> {
    fn stage(self, stage: Stage) -> Result<T, InstallError>;
}

impl<T> StageContext<T> for anyhow::Result<T> {
    fn stage(self, stage: Stage) -> Result<T, InstallError> {
        self.map_err(|cause| InstallError::Stage { stage, cause })
    }
}
