use std::fs;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use crate::error::DiskError;
use crate::error::Result;
use crate::geometry::DriveGeometry;

/// One sector: a header byte run plus a data byte run, sized by the drive
/// geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub header: Vec<u8>,
    pub data: Vec<u8>,
}

impl Sector {
    pub fn blank(geometry: &DriveGeometry) -> Self {
        Self {
            header: vec![0; geometry.header_bytes],
            data: vec![0; geometry.data_bytes],
        }
    }
}

/// Sector-addressed disk store consumed by controller device models.
pub trait SectorDisk {
    fn geometry(&self) -> DriveGeometry;

    /// The sector at (cylinder, head, sector), or `None` when the address is
    /// outside the geometry.
    fn sector(&self, cylinder: u16, head: u8, sector: u8) -> Option<&Sector>;

    /// Replaces the sector at (cylinder, head, sector). Returns `false`
    /// (dropping the write) when the address is outside the geometry.
    fn put_sector(&mut self, cylinder: u16, head: u8, sector: u8, contents: Sector) -> bool;
}

/// An entire drive held in memory.
///
/// The raw on-file format is the in-memory layout verbatim: sectors in
/// cylinder-major order, each one header run followed by its data run.
#[derive(Debug, Clone)]
pub struct DiskImage {
    geometry: DriveGeometry,
    sectors: Vec<Sector>,
}

impl DiskImage {
    /// A zero-filled image of the given geometry.
    pub fn blank(geometry: DriveGeometry) -> Self {
        Self {
            geometry,
            sectors: vec![Sector::blank(&geometry); geometry.total_sectors()],
        }
    }

    /// Loads a raw image file. The file size must match the geometry's
    /// capacity exactly.
    pub fn load(path: &Path, geometry: DriveGeometry) -> Result<Self> {
        let mut file = fs::File::open(path)?;
        let actual = file.metadata()?.len();
        let expected = geometry.capacity_bytes();
        if actual != expected {
            return Err(DiskError::ImageSize { actual, expected });
        }

        let mut image = Self {
            geometry,
            sectors: Vec::with_capacity(geometry.total_sectors()),
        };
        for _ in 0..geometry.total_sectors() {
            let mut sector = Sector::blank(&geometry);
            file.read_exact(&mut sector.header)?;
            file.read_exact(&mut sector.data)?;
            image.sectors.push(sector);
        }
        Ok(image)
    }

    /// Writes the image back out in the raw format.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = fs::File::create(path)?;
        for sector in &self.sectors {
            file.write_all(&sector.header)?;
            file.write_all(&sector.data)?;
        }
        file.sync_all()?;
        Ok(())
    }
}

impl SectorDisk for DiskImage {
    fn geometry(&self) -> DriveGeometry {
        self.geometry
    }

    fn sector(&self, cylinder: u16, head: u8, sector: u8) -> Option<&Sector> {
        if !self.geometry.contains(cylinder, head, sector) {
            return None;
        }
        Some(&self.sectors[self.geometry.index_of(cylinder, head, sector)])
    }

    fn put_sector(&mut self, cylinder: u16, head: u8, sector: u8, contents: Sector) -> bool {
        if !self.geometry.contains(cylinder, head, sector) {
            return false;
        }
        self.sectors[self.geometry.index_of(cylinder, head, sector)] = contents;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: DriveGeometry = DriveGeometry {
        cylinders: 4,
        heads: 2,
        sectors: 3,
        header_bytes: 4,
        data_bytes: 16,
    };

    fn patterned(tag: u8) -> Sector {
        Sector {
            header: vec![tag; SMALL.header_bytes],
            data: (0..SMALL.data_bytes as u8).map(|b| b ^ tag).collect(),
        }
    }

    #[test]
    fn blank_image_is_zero_filled() {
        let image = DiskImage::blank(SMALL);
        let sector = image.sector(3, 1, 2).unwrap();
        assert!(sector.header.iter().all(|&b| b == 0));
        assert!(sector.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_geometry_addresses_are_rejected() {
        let mut image = DiskImage::blank(SMALL);
        assert!(image.sector(4, 0, 0).is_none());
        assert!(image.sector(0, 2, 0).is_none());
        assert!(!image.put_sector(0, 0, 3, patterned(1)));
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut image = DiskImage::blank(SMALL);
        assert!(image.put_sector(2, 1, 0, patterned(0xA5)));
        assert_eq!(image.sector(2, 1, 0).unwrap(), &patterned(0xA5));
        // Neighbours untouched.
        assert_eq!(image.sector(2, 0, 0).unwrap(), &Sector::blank(&SMALL));
    }

    #[test]
    fn save_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.img");

        let mut image = DiskImage::blank(SMALL);
        image.put_sector(0, 0, 0, patterned(0x11));
        image.put_sector(3, 1, 2, patterned(0x22));
        image.save(&path).unwrap();

        let reloaded = DiskImage::load(&path, SMALL).unwrap();
        assert_eq!(reloaded.sector(0, 0, 0).unwrap(), &patterned(0x11));
        assert_eq!(reloaded.sector(3, 1, 2).unwrap(), &patterned(0x22));
        assert_eq!(reloaded.sector(1, 1, 1).unwrap(), &Sector::blank(&SMALL));
    }

    #[test]
    fn load_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.img");
        fs::write(&path, [0u8; 100]).unwrap();

        let err = DiskImage::load(&path, SMALL).unwrap_err();
        assert!(matches!(
            err,
            DiskError::ImageSize {
                actual: 100,
                expected
            } if expected == SMALL.capacity_bytes()
        ));
    }
}
