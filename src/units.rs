//! Pixel <-> page-space conversion for blocks scaled to a fixed width.
//!
//! A block is always drawn exactly `target_width` wide, so its page-space
//! height is `pixel_height * target_width / pixel_width`. The inverse,
//! [`rows_within`], answers how many whole source rows fit into a given
//! height; splitting only ever cuts on whole rows.

use crate::error::Result;
use crate::raster::RasterBlock;
use crate::types::Pt;

pub fn to_page_units(block: &RasterBlock, target_width: Pt) -> Result<Pt> {
    block.validate()?;
    Ok(rows_to_height(
        block.pixel_height(),
        target_width,
        block.pixel_width(),
    ))
}

/// Page-space height of `rows` source rows of a bitmap `pixel_width` wide.
pub fn rows_to_height(rows: u32, target_width: Pt, pixel_width: u32) -> Pt {
    target_width.mul_ratio(rows as i64, pixel_width as i64)
}

/// Largest number of source rows whose scaled height does not exceed `height`.
pub fn rows_within(height: Pt, target_width: Pt, pixel_width: u32) -> u32 {
    let height_milli = height.to_milli_i64() as i128;
    let width_milli = target_width.to_milli_i64() as i128;
    if height_milli <= 0 || width_milli <= 0 || pixel_width == 0 {
        return 0;
    }
    let mut rows = clamp_rows(height_milli * pixel_width as i128 / width_milli);
    // The forward conversion rounds to the nearest milli-point, which can move
    // the boundary by one row either way.
    while rows > 0 && rows_to_height(rows, target_width, pixel_width) > height {
        rows -= 1;
    }
    while rows < u32::MAX && rows_to_height(rows + 1, target_width, pixel_width) <= height {
        rows += 1;
    }
    rows
}

fn clamp_rows(rows: i128) -> u32 {
    rows.clamp(0, u32::MAX as i128) as u32
}
