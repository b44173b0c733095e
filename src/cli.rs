use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "envelope")]
#[command(version)]
#[command(about = "Inspect nested archives and their module metadata", long_about = None)]
#[command(after_help = "Examples:\n  \
  envelope list app.jar                        list entries of an archive\n  \
  envelope list -v app.jar                     detailed entry table\n  \
  envelope modules app.jar                     derived module descriptors\n  \
  envelope info app.jar                        manifest attributes and load order\n  \
  envelope cat 'envelope:app.jar!LIB-INF/core.jar!com/acme/A.class' | xxd")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List entries of an archive
    List {
        /// Archive file path
        #[arg(value_name = "FILE")]
        file: String,

        /// List verbosely (size, compression, timestamps)
        #[arg(short = 'v')]
        verbose: bool,

        /// Show the multi-version view instead of the raw entry table
        #[arg(short = 'm', long = "versioned")]
        versioned: bool,
    },

    /// Derive and print module descriptors for the nested libraries of an
    /// envelope
    Modules {
        /// Envelope file path
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Print manifest attributes, bootstrap properties and library load
    /// order of an envelope
    Info {
        /// Envelope file path
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Resolve a composite location identifier and write the entry bytes
    /// to stdout
    Cat {
        /// Identifier, e.g. envelope:app.jar!LIB-INF/core.jar!res/x.txt
        #[arg(value_name = "LOCATION")]
        location: String,
    },
}
