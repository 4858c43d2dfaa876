
// MRC file (from the Medical Research Council, in the UK)
// https://en.wikipedia.org/wiki/MRC_(file_format)

// format specification:
// https://www.ccpem.ac.uk/mrc_format/mrc2014.php

// tilt angles go in the IMOD extended header:
// https://bio3d.colorado.edu/imod/doc/mrc_format.txt

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use half::f16;
use ndarray::{Array2, Array3, ArrayView3};


const HEADER_BYTES: usize = 1024;

/// the IMOD extended header type
const EXTTYP_SERI: &[u8; 4] = b"SERI";

/// bit flag in nreal: each section starts with a tilt angle, stored as a 2-byte int of degrees*100
const SERI_FLAG_TILT_ANGLE: i16 = 1;

const MRC2014_VERSION: i32 = 20140;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	/// 8-bit signed int
	Int8,
	/// 16-bit signed int
	Int16,
	/// 32-bit float
	Float32,
	/// 16-bit unsigned int
	Uint16,
	/// 16-bit IEEE half float
	Float16
}

impl Mode {

	pub fn from_id(id: i32) -> Result<Self> {
		match id {
			0 => Ok(Self::Int8),
			1 => Ok(Self::Int16),
			2 => Ok(Self::Float32),
			6 => Ok(Self::Uint16),
			12 => Ok(Self::Float16),
			_ => bail!("Unsupported MRC mode: {}", id)
		}
	}

	pub fn id(&self) -> i32 {
		match self {
			Self::Int8 => 0,
			Self::Int16 => 1,
			Self::Float32 => 2,
			Self::Uint16 => 6,
			Self::Float16 => 12
		}
	}

	pub fn bytes_per_voxel(&self) -> usize {
		match self {
			Self::Int8 => 1,
			Self::Int16 | Self::Uint16 | Self::Float16 => 2,
			Self::Float32 => 4
		}
	}
}


/// An MRC volume, always held as floats in memory
#[derive(Debug, Clone, PartialEq)]
pub struct Mrc {
	nx: u32,
	ny: u32,
	nz: u32,
	voxels: Vec<f32>,
	/// one angle per section, in degrees
	tilt_angles: Option<Vec<f64>>
}

impl Mrc {

	pub fn new(nx: u32, ny: u32, nz: u32) -> Self {
		Self {
			nx,
			ny,
			nz,
			voxels: vec![0.0; (nx as usize)*(ny as usize)*(nz as usize)],
			tilt_angles: None
		}
	}

	/// Makes a volume from a stack shaped [rows, cols, sections]
	pub fn from_stack(stack: ArrayView3<f32>) -> Self {
		let (rows, cols, sections) = stack.dim();
		let mut mrc = Self::new(cols as u32, rows as u32, sections as u32);
		for ((y, x, z), v) in stack.indexed_iter() {
			mrc.set(x as u32, y as u32, z as u32, *v);
		}
		mrc
	}

	pub fn nx(&self) -> u32 {
		self.nx
	}

	pub fn ny(&self) -> u32 {
		self.ny
	}

	pub fn nz(&self) -> u32 {
		self.nz
	}

	fn index(&self, x: u32, y: u32, z: u32) -> usize {
		let x = x as usize;
		let y = y as usize;
		let z = z as usize;
		let nx = self.nx as usize;
		let ny = self.ny as usize;
		return z*nx*ny + y*nx + x;
	}

	pub fn get(&self, x: u32, y: u32, z: u32) -> f32 {
		self.voxels[self.index(x, y, z)]
	}

	pub fn set(&mut self, x: u32, y: u32, z: u32, val: f32) {
		let i = self.index(x, y, z);
		self.voxels[i] = val;
	}

	pub fn tilt_angles(&self) -> Option<&[f64]> {
		self.tilt_angles.as_deref()
	}

	pub fn tilt_angle(&self, z: u32) -> Option<f64> {
		self.tilt_angles.as_ref()
			.and_then(|angles| angles.get(z as usize))
			.copied()
	}

	pub fn set_tilt_angles(&mut self, angles: Vec<f64>) -> Result<()> {
		if angles.len() != self.nz as usize {
			bail!("Expected {} tilt angles, one per section, but got {}", self.nz, angles.len());
		}
		self.tilt_angles = Some(angles);
		Ok(())
	}

	/// One section as an image shaped [rows=y, cols=x]
	pub fn section(&self, z: u32) -> Result<Array2<f32>> {
		if z >= self.nz {
			bail!("Section {} is out of range, volume has {} sections", z, self.nz);
		}
		let n = (self.nx as usize)*(self.ny as usize);
		let start = self.index(0, 0, z);
		let section = self.voxels[start .. start + n].to_vec();
		Array2::from_shape_vec((self.ny as usize, self.nx as usize), section)
			.context("Failed to shape MRC section")
	}

	/// The whole volume as a stack shaped [rows=y, cols=x, sections=z]
	pub fn to_stack(&self) -> Result<Array3<f32>> {
		let zyx = Array3::from_shape_vec(
			(self.nz as usize, self.ny as usize, self.nx as usize),
			self.voxels.clone()
		).context("Failed to shape MRC volume")?;
		Ok(zyx.permuted_axes([1, 2, 0])
			.as_standard_layout()
			.into_owned())
	}

	pub fn read(path: impl AsRef<Path>) -> Result<Self> {

		let path = path.as_ref();

		let file = File::open(&path)
			.context(format!("Failed to open file for reading: {}", path.to_string_lossy()))?;
		let file_len = file.metadata()
			.context(format!("Failed to read file metadata: {}", path.to_string_lossy()))?
			.len();
		let mut reader = BufReader::new(file);

		let mut header = [0u8; HEADER_BYTES];
		reader.read_exact(&mut header)
			.context(format!("MRC file too short to hold a header: {}", path.to_string_lossy()))?;

		// only little-endian files, see the machine stamp (word 54)
		if header[212] != 0x44 && header[212] != 0x41 {
			bail!("Only little-endian MRC files are supported, machine stamp was {:02x?}", &header[212 .. 216]);
		}

		let mut cursor = Cursor::new(&header[..]);
		let nx = read_dim(&mut cursor, "nx")?;
		let ny = read_dim(&mut cursor, "ny")?;
		let nz = read_dim(&mut cursor, "nz")?;
		let mode = Mode::from_id(cursor.read_i32::<LE>()?)?;

		// word 24: size of the extended header, in bytes
		cursor.seek(SeekFrom::Start(4*23))?;
		let nsymbt = cursor.read_i32::<LE>()?;
		if nsymbt < 0 {
			bail!("Invalid extended header size: {}", nsymbt);
		}

		// word 27: extended header type
		let exttyp = &header[104 .. 108];

		// IMOD's per-section layout of the extended header
		cursor.seek(SeekFrom::Start(128))?;
		let nint = cursor.read_i16::<LE>()?;
		let nreal = cursor.read_i16::<LE>()?;

		// the header can claim anything, so check it against the file before allocating
		let n = (nx as usize).checked_mul(ny as usize)
			.and_then(|n| n.checked_mul(nz as usize))
			.with_context(|| format!("MRC dimensions are too large: {}x{}x{}", nx, ny, nz))?;
		let expected_len = n.checked_mul(mode.bytes_per_voxel())
			.and_then(|len| len.checked_add(HEADER_BYTES + nsymbt as usize))
			.with_context(|| format!("MRC dimensions are too large: {}x{}x{}", nx, ny, nz))?;
		if expected_len as u64 > file_len {
			bail!("MRC file is truncated: header describes {} bytes, but the file has only {}", expected_len, file_len);
		}

		let mut extended = vec![0u8; nsymbt as usize];
		reader.read_exact(&mut extended)
			.context("Failed to read MRC extended header")?;

		let tilt_angles =
			if exttyp == EXTTYP_SERI && (nreal & SERI_FLAG_TILT_ANGLE) != 0 && nint >= 2 {
				let mut angles = Vec::with_capacity(nz as usize);
				for z in 0 .. nz as usize {
					let offset = z*(nint as usize);
					let Some(bytes) = extended.get(offset .. offset + 2)
						else { bail!("MRC extended header too short for {} sections", nz); };
					let centidegrees = Cursor::new(bytes).read_i16::<LE>()?;
					angles.push(centidegrees as f64/100.0);
				}
				Some(angles)
			} else {
				None
			};

		// read the voxels: z(y(x)) order
		let mut voxels = vec![0f32; n];
		match mode {
			Mode::Float32 => reader.read_f32_into::<LE>(&mut voxels)?,
			Mode::Int8 => {
				let mut buf = vec![0i8; n];
				reader.read_i8_into(&mut buf)?;
				for (dst, src) in voxels.iter_mut().zip(buf) {
					*dst = src as f32;
				}
			}
			Mode::Int16 => {
				let mut buf = vec![0i16; n];
				reader.read_i16_into::<LE>(&mut buf)?;
				for (dst, src) in voxels.iter_mut().zip(buf) {
					*dst = src as f32;
				}
			}
			Mode::Uint16 => {
				let mut buf = vec![0u16; n];
				reader.read_u16_into::<LE>(&mut buf)?;
				for (dst, src) in voxels.iter_mut().zip(buf) {
					*dst = src as f32;
				}
			}
			Mode::Float16 => {
				let mut buf = vec![0u16; n];
				reader.read_u16_into::<LE>(&mut buf)?;
				for (dst, src) in voxels.iter_mut().zip(buf) {
					*dst = f16::from_bits(src).to_f32();
				}
			}
		}

		Ok(Self {
			nx,
			ny,
			nz,
			voxels,
			tilt_angles
		})
	}

	pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {

		let path = path.as_ref();

		let mut file = File::create(&path)
			.context(format!("Failed to open file for writing: {}", path.to_string_lossy()))?;
		let mut writer = BufWriter::new(&mut file);

		// tilt angles need 2 bytes per section in the extended header
		let (exttyp, nint, nreal) = match self.tilt_angles {
			Some(_) => (*EXTTYP_SERI, 2i16, SERI_FLAG_TILT_ANGLE),
			None => ([0u8; 4], 0i16, 0i16)
		};
		let nsymbt = (nint as u32)*self.nz;

		let (dmin, dmax, dmean, rms) = self.stats();

		// first, write the header: it's 256 (4-byte) words, or 1024 bytes total

		// write the dimensions (words 1-3)
		writer.write_u32::<LE>(self.nx)?;
		writer.write_u32::<LE>(self.ny)?;
		writer.write_u32::<LE>(self.nz)?;

		// always write floats
		writer.write_i32::<LE>(Mode::Float32.id())?;

		// sub-volume start (words 5-7)
		writer.write_all(&[0u8; 4*3])?;

		// sampling (words 8-10)
		writer.write_u32::<LE>(self.nx)?;
		writer.write_u32::<LE>(self.ny)?;
		writer.write_u32::<LE>(self.nz)?;

		// cell dimensions (words 11-16), assume 1 A per pixel
		writer.write_f32::<LE>(self.nx as f32)?;
		writer.write_f32::<LE>(self.ny as f32)?;
		writer.write_f32::<LE>(self.nz as f32)?;
		for _ in 0 .. 3 {
			writer.write_f32::<LE>(90.0)?;
		}

		// axis mapping (words 17-19)
		writer.write_i32::<LE>(1)?;
		writer.write_i32::<LE>(2)?;
		writer.write_i32::<LE>(3)?;

		// density stats (words 20-22)
		writer.write_f32::<LE>(dmin)?;
		writer.write_f32::<LE>(dmax)?;
		writer.write_f32::<LE>(dmean)?;

		// space group 0 means an image stack (word 23)
		writer.write_i32::<LE>(0)?;

		// word 24
		writer.write_u32::<LE>(nsymbt)?;

		// we're at word 25 now: skip to word 27
		writer.write_all(&[0u8; 4*(27 - 25)])?;
		writer.write_all(&exttyp)?;
		writer.write_i32::<LE>(MRC2014_VERSION)?;

		// we're at word 29 now: skip to IMOD's nint,nreal (byte 128, word 33)
		writer.write_all(&[0u8; 4*(33 - 29)])?;
		writer.write_i16::<LE>(nint)?;
		writer.write_i16::<LE>(nreal)?;

		// we're at word 34 now: skip to the origin (word 50)
		writer.write_all(&[0u8; 4*(50 - 34)])?;
		writer.write_all(&[0u8; 4*3])?;

		// words 53-54: the map marker, and the machine stamp to signal little-endianess
		writer.write_all(b"MAP ")?;
		writer.write_all(&[0x44, 0x44, 0x00, 0x00])?;

		writer.write_f32::<LE>(rms)?;

		// no labels (words 56-256)
		writer.write_i32::<LE>(0)?;
		writer.write_all(&[0u8; 4*(257 - 57)])?;

		if let Some(angles) = &self.tilt_angles {
			for angle in angles {
				writer.write_i16::<LE>((angle*100.0).round() as i16)?;
			}
		}

		// write the voxels: z(y(x)) order
		for v in &self.voxels {
			writer.write_f32::<LE>(*v)?;
		}

		// write buffers should be flushed before dropping
		writer.flush()?;

		Ok(())
	}

	fn stats(&self) -> (f32, f32, f32, f32) {
		if self.voxels.is_empty() {
			return (0.0, 0.0, 0.0, 0.0);
		}
		let n = self.voxels.len() as f64;
		let mut min = f32::INFINITY;
		let mut max = f32::NEG_INFINITY;
		let mut sum = 0f64;
		for &v in &self.voxels {
			min = min.min(v);
			max = max.max(v);
			sum += v as f64;
		}
		let mean = sum/n;
		let var = self.voxels.iter()
			.map(|&v| (v as f64 - mean).powi(2))
			.sum::<f64>()/n;
		(min, max, mean as f32, var.sqrt() as f32)
	}
}


fn read_dim(cursor: &mut Cursor<&[u8]>, name: &str) -> Result<u32> {
	let dim = cursor.read_i32::<LE>()?;
	u32::try_from(dim)
		.context(format!("Invalid MRC dimension {}: {}", name, dim))
}

