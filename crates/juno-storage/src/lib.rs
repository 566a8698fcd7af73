//! Drive geometry and disk images for the workstation's hard-disk subsystem.
//!
//! The device models need a *sector-oriented* store where each sector is a
//! header byte run plus a data byte run (vintage drives kept filesystem
//! metadata in the header). This crate provides:
//!
//! - [`DriveGeometry`]: cylinder/head/sector counts and per-sector byte sizes
//! - [`Sector`]: one header + data pair
//! - [`SectorDisk`]: the canonical sector-addressed disk trait
//! - [`DiskImage`]: in-memory implementation with raw-file load/save
//!
//! Controllers mutate only the in-memory image; persisting it back to a file
//! is an explicit [`DiskImage::save`] by the embedder.

#![forbid(unsafe_code)]

mod error;
mod geometry;
mod image;

pub use error::{DiskError, Result};
pub use geometry::{DriveGeometry, SHUGART_SA4000};
pub use image::{DiskImage, Sector, SectorDisk};
