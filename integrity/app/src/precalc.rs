/*++

Licensed under the Apache-2.0 license.

File Name:

   precalc.rs

Abstract:

    File contains the compute, patch and verify commands of the integrity
    precompute tool.

--*/
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::ArgMatches;
use cryptolith_common::{INTEGRITY_MAC_SIZE, PRECALC_MAC_MARKER};
use cryptolith_integrity::compute_code_mac;

fn read_image(args: &ArgMatches) -> anyhow::Result<(PathBuf, Vec<u8>)> {
    let path = args
        .get_one::<PathBuf>("image")
        .context("image path missing")?
        .clone();
    let bytes =
        fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok((path, bytes))
}

fn max_offset(args: &ArgMatches) -> usize {
    args.get_one::<usize>("max-offset").copied().unwrap_or(0)
}

fn code_mac(image: &[u8], max_offset: usize) -> anyhow::Result<[u8; INTEGRITY_MAC_SIZE]> {
    compute_code_mac(image, max_offset)
        .map_err(|err| anyhow!("mac computation failed: 0x{:08X}", u32::from(err)))
}

/// Offset of the MAC bytes inside the precalc storage, located by marker.
fn find_slot(image: &[u8]) -> anyhow::Result<usize> {
    let pos = image
        .windows(PRECALC_MAC_MARKER.len())
        .position(|window| window == PRECALC_MAC_MARKER.as_slice())
        .ok_or_else(|| anyhow!("precalc marker not found in binary"))?;
    let slot = pos + PRECALC_MAC_MARKER.len();
    if image.len() < slot + INTEGRITY_MAC_SIZE {
        bail!("precalc slot is truncated");
    }
    Ok(slot)
}

pub(crate) fn run_compute(args: &ArgMatches) -> anyhow::Result<()> {
    let (_, image) = read_image(args)?;
    let mac = code_mac(&image, max_offset(args))?;
    println!("{}", hex::encode(mac));
    Ok(())
}

pub(crate) fn run_patch(args: &ArgMatches) -> anyhow::Result<()> {
    let (_, mut image) = read_image(args)?;
    let mac = code_mac(&image, max_offset(args))?;
    let slot = find_slot(&image)?;
    image[slot..slot + INTEGRITY_MAC_SIZE].copy_from_slice(&mac);

    let out = args.get_one::<PathBuf>("out").context("out path missing")?;
    fs::write(out, &image).with_context(|| format!("failed to write {}", out.display()))?;
    println!("{} {}", out.display(), hex::encode(mac));
    Ok(())
}

pub(crate) fn run_verify(args: &ArgMatches) -> anyhow::Result<()> {
    let (path, image) = read_image(args)?;
    let mac = code_mac(&image, max_offset(args))?;
    let slot = find_slot(&image)?;
    let embedded = &image[slot..slot + INTEGRITY_MAC_SIZE];
    if embedded != mac.as_slice() {
        bail!(
            "{}: embedded {} != computed {}",
            path.display(),
            hex::encode(embedded),
            hex::encode(mac)
        );
    }
    println!("{} ok", path.display());
    Ok(())
}
