use clap::{Parser, Subcommand};

/// SkillPort - secure distribution for agent skills
#[derive(Parser, Debug)]
#[command(name = "skillport")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit a machine-readable JSON envelope on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a new skill directory with a manifest template
    Init {
        /// Target directory
        #[arg(value_name = "DIR")]
        dir: String,

        /// Skill id as <author-slug>/<skill-slug>
        #[arg(long, value_name = "ID")]
        id: String,
    },

    /// Security-scan a skill directory or packaged .ssp archive
    Scan {
        /// Path to a skill directory or .ssp file
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Build and sign a .ssp archive from a skill directory
    Export {
        /// Skill directory containing skillport.json
        #[arg(value_name = "DIR")]
        dir: String,

        /// Output path (default: <skill>-<version>.ssp)
        #[arg(long, value_name = "FILE")]
        output: Option<String>,
    },

    /// Re-sign an existing .ssp with the local default key
    Sign {
        /// Path to the .ssp file
        #[arg(value_name = "ARCHIVE")]
        archive: String,
    },

    /// Verify schema, checksums and signatures of a .ssp archive
    Verify {
        /// Path to the .ssp file
        #[arg(value_name = "ARCHIVE")]
        archive: String,
    },

    /// Install a skill from a local .ssp file or the marketplace
    Install {
        /// Path to a .ssp file, or a marketplace skill id
        #[arg(value_name = "TARGET")]
        target: String,

        /// Reinstall even if the same version is already installed
        #[arg(long)]
        force: bool,

        /// Never prompt; policy gates run fail-closed
        #[arg(long)]
        non_interactive: bool,

        /// Pre-approve elevated-risk installs in non-interactive mode
        #[arg(long)]
        accept_risk: bool,
    },

    /// Run the install pipeline without writing anything
    DryRun {
        /// Path to a .ssp file, or a marketplace skill id
        #[arg(value_name = "TARGET")]
        target: String,
    },

    /// Remove an installed skill
    Uninstall {
        /// Skill id as <author-slug>/<skill-slug>
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Verify, scan and upload a .ssp to the marketplace
    Publish {
        /// Path to the .ssp file
        #[arg(value_name = "ARCHIVE")]
        archive: String,
    },

    /// Report what an install would do: permissions, environment, policy
    Plan {
        /// Path to the .ssp file
        #[arg(value_name = "ARCHIVE")]
        archive: String,
    },

    /// Show the manifest and verification state of a .ssp archive
    Inspect {
        /// Path to the .ssp file
        #[arg(value_name = "ARCHIVE")]
        archive: String,
    },

    /// Signing key management
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },

    /// Derive a manifest for a bare skill directory (SKILL.md only)
    Convert {
        /// Skill directory containing SKILL.md
        #[arg(value_name = "DIR")]
        dir: String,

        /// Author slug used in the generated id
        #[arg(long, default_value = "local")]
        author: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeysCommands {
    /// Generate the default keypair if absent and register it with the
    /// marketplace
    Register {
        /// Human-readable label for the key
        #[arg(long, default_value = "default")]
        label: String,
    },
}
