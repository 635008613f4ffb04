use arkive_gf::Texture;
use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{fs::File, io::BufReader, path::PathBuf};

#[derive(Args)]
pub struct InfoArgs {
    /// GF textures to describe
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        for path in &self.files {
            let file = File::open(path)
                .into_diagnostic()
                .context(format!("opening {}", path.display()))?;
            let texture = Texture::read(&mut BufReader::new(file)).context(format!("reading {}", path.display()))?;

            println!("{}", path.display().bold());
            for info in texture.info() {
                println!("  {:<12} {}", info.label.dimmed(), info.value);
            }
            println!("  {:<12} {:#04X}", "Repeat byte".dimmed(), texture.repeat_byte);
        }
        Ok(())
    }
}
