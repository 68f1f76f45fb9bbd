use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use deskfs::StoreHandle;

use crate::common::FsContext;

/// Mount a host directory at `/mnt/<name>`; remembered across runs
pub async fn mount_command(ctx: &FsContext, name: &str, dir: &Path) -> Result<()> {
    let fs = ctx.open().await?;
    let handle = StoreHandle::acquire(dir)
        .await
        .with_context(|| format!("acquiring {}", dir.display()))?;
    fs.mount(name, handle)
        .await
        .with_context(|| format!("mounting {name}"))
}

pub async fn unmount_command(ctx: &FsContext, name: &str) -> Result<()> {
    let fs = ctx.open().await?;
    if !fs.unmount(name).await? {
        return Err(anyhow!("{name} is not mounted"));
    }
    Ok(())
}

/// One line per mount: name, then the host directory behind it
pub async fn mounts_command<W: Write>(ctx: &FsContext, out: &mut W) -> Result<()> {
    let fs = ctx.open().await?;
    let persisted = fs.persisted_mounts().await?;
    for name in fs.mounts().await {
        match persisted.get(&name) {
            Some(handle) => writeln!(out, "{name}\t{}", handle.root().display())?,
            None => writeln!(out, "{name}")?,
        }
    }
    Ok(())
}
