use std::io::Write;

use anyhow::Result;
use deskfs::{CachedValue, Depth, Item};
use serde::Serialize;

use crate::common::{FsContext, write_json};

/// Print the item at `path` every time polling sees it change.
///
/// Stops after `updates` values when given; a missing item prints `null`.
pub async fn watch_command<W: Write>(
    ctx: &FsContext,
    path: &str,
    deep: bool,
    updates: Option<usize>,
    out: &mut W,
) -> Result<()> {
    let fs = ctx.open().await?;
    let depth = if deep { Depth::Deep } else { Depth::Shallow };

    if let Some(Item::File(_)) = fs.get_item(path, Depth::Shallow).await? {
        let mut sub = fs.get_cached_file(path, depth);
        let mut seen = 0;
        while let Some(value) = sub.changed().await {
            if print_ready(out, value)? {
                seen += 1;
                if updates.is_some_and(|n| seen >= n) {
                    break;
                }
            }
        }
    } else {
        let mut sub = fs.get_cached_folder(path, depth);
        let mut seen = 0;
        while let Some(value) = sub.changed().await {
            if print_ready(out, value)? {
                seen += 1;
                if updates.is_some_and(|n| seen >= n) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns whether anything was printed
fn print_ready<W: Write, T: Serialize>(out: &mut W, value: CachedValue<T>) -> Result<bool> {
    match value {
        CachedValue::Pending => Ok(false),
        CachedValue::Ready(item) => {
            write_json(out, &serde_json::to_value(&item)?)?;
            out.flush()?;
            Ok(true)
        }
    }
}
