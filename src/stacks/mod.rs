//! Built-in stack definitions
//!
//! Each stack is a plain builder function that creates a fresh [`Document`],
//! registers the shared bundles it needs and then its own declarations.

mod cluster;
mod cms;
mod consul;
mod gateway;
mod iam;
mod lambda;
mod rds_backup;
mod vault;
mod vpc;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::config::StackConfig;
use crate::document::{Document, DocumentError};

pub use cms::build as build_cms;
pub use consul::build as build_consul;
pub use gateway::build as build_gateway;
pub use lambda::build as build_lambda;
pub use rds_backup::build as build_rds_backup;
pub use vault::build as build_vault;
pub use vpc::build as build_vpc;

/// Error returned when a stack name is not known
#[derive(Debug, Error, PartialEq)]
#[error("Unknown stack '{name}' (available: {})", StackKind::names().join(", "))]
pub struct UnknownStack {
    pub name: String,
}

/// The stacks this crate knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Vpc,
    Consul,
    Lambda,
    Gateway,
    Cms,
    Vault,
    RdsBackup,
}

impl StackKind {
    pub const ALL: [StackKind; 7] = [
        StackKind::Vpc,
        StackKind::Consul,
        StackKind::Lambda,
        StackKind::Gateway,
        StackKind::Cms,
        StackKind::Vault,
        StackKind::RdsBackup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StackKind::Vpc => "vpc",
            StackKind::Consul => "consul",
            StackKind::Lambda => "lambda",
            StackKind::Gateway => "gateway",
            StackKind::Cms => "cms",
            StackKind::Vault => "vault",
            StackKind::RdsBackup => "rds-backup",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.name()).collect()
    }

    /// Default output file name
    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    pub fn description(self) -> &'static str {
        match self {
            StackKind::Vpc => vpc::DESCRIPTION,
            StackKind::Consul => consul::DESCRIPTION,
            StackKind::Lambda => lambda::DESCRIPTION,
            StackKind::Gateway => gateway::DESCRIPTION,
            StackKind::Cms => cms::DESCRIPTION,
            StackKind::Vault => vault::DESCRIPTION,
            StackKind::RdsBackup => rds_backup::DESCRIPTION,
        }
    }

    /// Build the stack's document
    pub fn build(self, config: &StackConfig) -> Result<Document, DocumentError> {
        match self {
            StackKind::Vpc => vpc::build(config),
            StackKind::Consul => consul::build(config),
            StackKind::Lambda => lambda::build(config),
            StackKind::Gateway => gateway::build(config),
            StackKind::Cms => cms::build(config),
            StackKind::Vault => vault::build(config),
            StackKind::RdsBackup => rds_backup::build(config),
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for StackKind {
    type Err = UnknownStack;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStack {
                name: s.to_string(),
            })
    }
}
