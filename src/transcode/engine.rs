//! Transcode engine contract
//!
//! A lazily loaded engine with its own flat filesystem. One engine serves
//! many jobs in sequence; its filesystem is never cleared implicitly.

use crate::utils::TranscodeError;
use async_trait::async_trait;

#[async_trait]
pub trait TranscodeEngine: Send {
    fn is_loaded(&self) -> bool;

    /// Load the engine. Calling it again once loaded is a no-op.
    async fn load(&mut self) -> Result<(), TranscodeError>;

    async fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), TranscodeError>;

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, TranscodeError>;

    async fn unlink(&mut self, name: &str) -> Result<(), TranscodeError>;

    /// Run one command. Taking `&mut self` keeps jobs single-flight per engine.
    async fn run(&mut self, args: &[String]) -> Result<(), TranscodeError>;

    /// Names currently present in the engine filesystem
    fn files(&self) -> Vec<String>;
}
