use clap::CommandFactory;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MANPAGE: &str = "csvstudio.1";

fn render_manpage() -> io::Result<Vec<u8>> {
    let mut page = Vec::new();
    clap_mangen::Man::new(csvstudio_cli::Args::command()).render(&mut page)?;
    Ok(page)
}

/// `target/<profile>/` for an OUT_DIR of `target/<profile>/build/<pkg>/out`.
fn profile_dir(out_dir: &Path) -> Option<&Path> {
    out_dir.ancestors().nth(3)
}

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=crates/csvstudio-cli/src/lib.rs");

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR is not set"))?;
    let page = render_manpage()?;
    fs::write(out_dir.join(MANPAGE), &page)?;

    // Release artifacts ship the page next to the binary.
    if env::var("PROFILE").as_deref() == Ok("release") {
        if let Some(dir) = profile_dir(&out_dir) {
            fs::write(dir.join(MANPAGE), &page)?;
        }
    }

    Ok(())
}
