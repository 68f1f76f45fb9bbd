use std::io::Write;

use anyhow::{Result, anyhow};
use deskfs::{Depth, File};

use crate::common::FsContext;

/// Copy a file's raw content to `out`
pub async fn cat_command<W: Write>(ctx: &FsContext, path: &str, out: &mut W) -> Result<()> {
    let fs = ctx.open().await?;
    let file = fs
        .get_file(path, Depth::Deep)
        .await?
        .and_then(File::into_deep)
        .ok_or_else(|| anyhow!("{path}: no such file"))?;
    out.write_all(file.content.as_bytes())?;
    out.flush()?;
    Ok(())
}
