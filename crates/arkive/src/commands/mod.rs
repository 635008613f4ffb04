pub mod archive;
pub mod texture;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle CNT, IPK and DAT archives
    Archive {
        #[command(subcommand)]
        command: archive::ArchiveCommands,
    },
    /// Handle GF textures
    Texture {
        #[command(subcommand)]
        command: texture::TextureCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Archive { command } => command.handle(),
            Commands::Texture { command } => command.handle(),
        }
    }
}
