use std::io::Write;

use anyhow::{Result, anyhow};
use deskfs::{Depth, Item};

use crate::common::{FsContext, write_json};

/// Print the folder (or file) at `path` as JSON
pub async fn list_command<W: Write>(
    ctx: &FsContext,
    path: &str,
    deep: bool,
    out: &mut W,
) -> Result<()> {
    let fs = ctx.open().await?;
    let depth = if deep { Depth::Deep } else { Depth::Shallow };
    diagnostics::debug!("listing {path} ({depth})", path: path, depth: depth.as_str());

    let value = match fs.get_item(path, depth).await? {
        Some(Item::Folder(folder)) => serde_json::to_value(&folder)?,
        Some(Item::File(file)) => serde_json::to_value(&file)?,
        None => return Err(anyhow!("{path}: no such file or folder")),
    };
    write_json(out, &value)
}
