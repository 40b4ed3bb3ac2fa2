// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: One subcommand per lifecycle verb, plus schema output.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imagewright")]
#[command(about = "Build, push and reconcile container images as declarative resources")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (to stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to imagewright.yml in the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and push the image described by a desired record
    Create {
        /// Record file (JSON); stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Refresh a state record from the registry
    Read {
        /// Record file (JSON); stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Rebuild and push from {"plan": ..., "prior": ...}
    Update {
        /// Plan/prior document (JSON); stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Delete a resource, removing the registry image if requested
    Delete {
        /// Record file (JSON); stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Produce state for an existing image
    Import {
        /// Image URI to import
        image_uri: String,
    },

    /// Print the resource attribute schema
    Schema,
}
