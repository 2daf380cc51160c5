//! Query-string schemas for the relay routes.
//!
//! Every field arrives as optional text and is validated here, before any
//! hardware, file or network access happens.

use serde::Deserialize;

use super::RelayError;
use crate::logtail::TailRequest;

/// `/commander?cmd=<text>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommanderQuery {
    pub cmd: Option<String>,
}

impl CommanderQuery {
    /// The command to forward. Absent or empty commands are rejected.
    pub fn into_command(self) -> Result<String, RelayError> {
        match self.cmd {
            Some(cmd) if !cmd.is_empty() => Ok(cmd),
            Some(_) => Err(RelayError::BadRequest("cmd must not be empty".into())),
            None => Err(RelayError::BadRequest("missing required parameter: cmd".into())),
        }
    }
}

/// `/getvoltage?num_recs=<int>&skip=<int>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TailQuery {
    pub num_recs: Option<String>,
    pub skip: Option<String>,
}

impl TailQuery {
    pub fn validate(&self) -> Result<TailRequest, RelayError> {
        Ok(TailRequest::parse(self.num_recs.as_deref(), self.skip.as_deref())?)
    }
}

/// `/flipmirror/state?state=<up|down>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MirrorQuery {
    pub state: Option<String>,
}
