pub mod export;
pub mod import;
pub mod info;

#[derive(clap::Subcommand)]
pub enum TextureCommands {
    /// Show the header of GF textures
    Info(info::InfoArgs),
    /// Convert GF textures to PNG, JPEG or BMP
    Export(export::ExportArgs),
    /// Convert a PNG, JPEG or BMP image into a GF texture
    Import(import::ImportArgs),
}

impl TextureCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            TextureCommands::Info(info) => info.handle(),
            TextureCommands::Export(export) => export.handle(),
            TextureCommands::Import(import) => import.handle(),
        }
    }
}
