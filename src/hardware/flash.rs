// License below.
//! Implements the NAND flash chip and the flash image file around it.
//!
//! The chip is a small command-driven state machine: command bytes select
//! an operation, address bytes assemble the page row and the in-page
//! column, and data bytes stream through a transfer buffer. Two chip
//! generations exist:
//!
//! | Variant | Mfr  | Model | Page size | log2(pages/block) | Pages   |
//! |---------|------|-------|-----------|-------------------|---------|
//! | Small   | 0x20 | 0x35  | 0x210     | 5                 | 0x10000 |
//! | Large   | 0xEC | 0xA1  | 0x840     | 6                 | 0x10000 |
//!
//! The page size includes the spare area. The flash image file is a
//! byte-for-byte dump of all pages; its size identifies the chip
//! (33 MiB small, 132 MiB large). Modified blocks are tracked in a
//! bitmap so only dirty blocks are written back.
#![warn(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use byteorder::{ByteOrder, LittleEndian};
use super::error::PhxError;

/// Page-0 magic word of non-CAS-Plus flash images.
pub const FLASH_MAGIC: u32 = 0x796EB03C;

/// Signature marking the extended manuf-data block as valid.
pub const MANUF_EXT_SIGNATURE: u32 = 0x4C9E5F91;

/// Raw image offset of the manuf-data structure.
const MANUF_OFFSET: usize = 0x844;

/// Size of a small-page flash image in bytes.
const IMAGE_SIZE_SMALL: u64 = 33 * 1024 * 1024;

/// Size of a large-page flash image in bytes.
const IMAGE_SIZE_LARGE: u64 = 132 * 1024 * 1024;


/// Fixed per-chip parameters.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct NandMetrics {
    /// Manufacturer byte returned by Read ID.
    pub chip_manuf: u8,
    /// Model byte returned by Read ID.
    pub chip_model: u8,
    /// Bytes per page, spare area included.
    pub page_size: u16,
    /// log2 of the pages per erase block.
    pub log2_pages_per_block: u8,
    /// Total page count.
    pub num_pages: u32,
}

const CHIPS: [NandMetrics; 2] = [
    // ST Micro NAND256R3A
    NandMetrics { chip_manuf: 0x20, chip_model: 0x35, page_size: 0x210, log2_pages_per_block: 5, num_pages: 0x10000 },
    // Samsung 1 GBit
    NandMetrics { chip_manuf: 0xEC, chip_model: 0xA1, page_size: 0x840, log2_pages_per_block: 6, num_pages: 0x10000 },
];


/// The chip's command state.
///
/// Discriminants are the command bytes that enter each state; `ReadIdModel`
/// is the internal "second ID byte pending" step.
#[derive(Debug, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum NandState {
    #[doc = "No operation in progress."]          Idle = 0xFF,
    #[doc = "Streaming page data out."]           Read = 0x00,
    #[doc = "Reporting the status register."]     Status = 0x70,
    #[doc = "Next read returns the manuf byte."]  ReadIdManuf = 0x90,
    #[doc = "Next read returns the model byte."]  ReadIdModel = 0x91,
    #[doc = "Collecting page data to program."]   Program = 0x80,
    #[doc = "Collecting the block row to erase."] EraseSetup = 0x60,
}


/// The NAND flash chip together with its backing image file.
pub struct NandFlash {
    metrics: NandMetrics,
    data: Vec<u8>,
    block_modified: Vec<bool>,
    writable: bool,

    state: NandState,
    addr_state: u8,
    area_pointer: u8,
    row: u32,
    column: u32,
    buffer: [u8; 0x840],
    buffer_pos: usize,

    file: Option<File>,
}

/// Machine configuration parsed from the manuf data of an image.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct FlashSettings {
    /// Product code (`product << 4 | revision`; `0x0C0` for CAS+ images
    /// that carry no manuf data at all).
    pub product: u32,
    /// SDRAM size in bytes.
    pub sdram_size: u32,
}

impl NandFlash {
    /// Creates an erased chip (all `0xFF`) without a backing file.
    pub fn new(large: bool) -> NandFlash {
        let metrics = CHIPS[large as usize];
        let size = metrics.page_size as usize * metrics.num_pages as usize;
        NandFlash {
            metrics,
            data: vec![0xFF; size],
            block_modified: vec![false; (metrics.num_pages >> metrics.log2_pages_per_block) as usize],
            writable: true,
            state: NandState::Idle,
            addr_state: 0,
            area_pointer: 0,
            row: 0,
            column: 0,
            buffer: [0; 0x840],
            buffer_pos: 0,
            file: None,
        }
    }

    /// Opens an existing flash image, deducing the chip from its size.
    pub fn open(path: &Path) -> Result<NandFlash, PhxError> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();
        let large = match size {
            IMAGE_SIZE_SMALL => false,
            IMAGE_SIZE_LARGE => true,
            _ => return Err(PhxError::BadFlashImageSize(size)),
        };

        let mut nand = NandFlash::new(large);
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut nand.data)?;
        nand.file = Some(file);
        info!("Loaded {} flash image `{}`.",
              if large { "large-page" } else { "small-page" }, path.display());
        Ok(nand)
    }

    /// Builds a fresh image: erased chip, page-0 magic, manuf data, and
    /// optional boot2/diags preloads at the chip-appropriate offsets.
    ///
    /// The image has no backing file until `save_as` is called.
    pub fn create_new(large: bool, product: u32, large_sdram: bool,
                      preload_boot2: Option<&Path>, preload_diags: Option<&Path>)
                      -> Result<NandFlash, PhxError> {
        let mut nand = NandFlash::new(large);
        let small_page = !large;

        LittleEndian::write_u32(&mut nand.data[0..], FLASH_MAGIC);
        nand.ecc_fix(0);
        nand.write_manuf_data(product, large_sdram);
        nand.ecc_fix(if small_page { 4 } else { 1 });

        if let Some(p) = preload_boot2 {
            nand.load_file(if small_page { 0x004000 } else { 0x020000 }, p)?;
        }
        if let Some(p) = preload_diags {
            nand.load_file(if small_page { 0x160000 } else { 0x320000 }, p)?;
        }
        Ok(nand)
    }

    fn write_manuf_data(&mut self, product: u32, large_sdram: bool) {
        let m = &mut self.data[MANUF_OFFSET..];
        LittleEndian::write_u16(&mut m[0x00..], (product >> 4) as u16);
        LittleEndian::write_u16(&mut m[0x02..], (product & 0xF) as u16);

        if product >> 4 >= 0x0F {
            // The extended block only exists on the newer ASIC.
            let e = &mut m[0x14..];
            LittleEndian::write_u32(&mut e[0x00..], MANUF_EXT_SIGNATURE);
            LittleEndian::write_u32(&mut e[0x04..], 5);    // features
            LittleEndian::write_u32(&mut e[0x08..], 76);   // default keypad: touchpad
            LittleEndian::write_u16(&mut e[0x0C..], 320);  // LCD width
            LittleEndian::write_u16(&mut e[0x0E..], 240);  // LCD height
            LittleEndian::write_u16(&mut e[0x10..], 16);   // LCD bpp
            LittleEndian::write_u16(&mut e[0x12..], 1);    // LCD colour
            if self.metrics.page_size < 0x800 {
                LittleEndian::write_u32(&mut e[0x14..], 0x160000); // diags
                LittleEndian::write_u32(&mut e[0x18..], 0x004000); // boot2
                LittleEndian::write_u32(&mut e[0x1C..], 0x150000); // bootdata
                LittleEndian::write_u32(&mut e[0x20..], 0x200000); // filesys
            } else {
                LittleEndian::write_u32(&mut e[0x14..], 0x320000);
                LittleEndian::write_u32(&mut e[0x18..], 0x020000);
                LittleEndian::write_u32(&mut e[0x1C..], 0x2C0000);
                LittleEndian::write_u32(&mut e[0x20..], 0x400000);
            }
            LittleEndian::write_u32(&mut e[0x24..], 0x561002); // clocks: 132 MHz
            LittleEndian::write_u32(&mut e[0x28..], if large_sdram { 0xFC018012 } else { 0xFE018011 });
            LittleEndian::write_u32(&mut e[0x2C..], 0); // LCD SPI sequence length
            LittleEndian::write_u16(&mut e[0x70..], 0x11A); // backlight min
            LittleEndian::write_u16(&mut e[0x72..], 0x1CE); // backlight max
            LittleEndian::write_u16(&mut e[0x74..], 0x16A); // backlight default
            LittleEndian::write_u16(&mut e[0x76..], 0x14);  // backlight increment
            m[0x90] = 0; // no boot graphics
        }
    }

    /// Parses product code and SDRAM size out of the manuf data.
    pub fn read_settings(&self) -> Result<FlashSettings, PhxError> {
        if LittleEndian::read_u32(&self.data[0..]) == 0xFFFFFFFF {
            // No manuf data at all: CAS+.
            return Ok(FlashSettings { product: 0x0C0, sdram_size: 32 * 1024 * 1024 });
        }

        let m = &self.data[MANUF_OFFSET..];
        let product_hi = LittleEndian::read_u16(&m[0x00..]) as u32;
        let revision = LittleEndian::read_u16(&m[0x02..]) as u32;
        let product = product_hi << 4 | revision;

        let mut sdram_size = 32 * 1024 * 1024;
        if product_hi >= 0x0F && LittleEndian::read_u32(&m[0x14..]) == MANUF_EXT_SIGNATURE {
            let cfg = LittleEndian::read_u32(&m[0x3C..]);
            let logsize = (cfg & 7) + (cfg >> 3 & 7);
            if logsize > 4 {
                return Err(PhxError::BadSdramConfig(cfg));
            }
            sdram_size = (4 * 1024 * 1024) << logsize;
        }
        Ok(FlashSettings { product, sdram_size })
    }

    /// Writes every modified block back to the image file.
    ///
    /// Must only be called while execution is paused; the modified map is
    /// cleared block by block as writes succeed.
    pub fn save_changes(&mut self) -> Result<(), PhxError> {
        let file = match self.file.as_mut() {
            Some(f) => f,
            None => { warn!("NAND flash: no image file to save to."); return Ok(()); }
        };
        let page_size = self.metrics.page_size as usize;
        let block_pages = 1usize << self.metrics.log2_pages_per_block;
        let block_size = page_size << self.metrics.log2_pages_per_block;

        let mut count = 0;
        for (block, modified) in self.block_modified.iter_mut().enumerate() {
            if !*modified { continue; }
            let offset = block * block_pages * page_size;
            file.seek(SeekFrom::Start(offset as u64))?;
            file.write_all(&self.data[offset..offset + block_size])?;
            *modified = false;
            count += 1;
        }
        file.flush()?;
        info!("NAND flash: saved {} modified blocks to file.", count);
        Ok(())
    }

    /// Writes the whole image to a new file, which becomes the backing
    /// file from then on.
    pub fn save_as(&mut self, path: &Path) -> Result<(), PhxError> {
        let mut file = OpenOptions::new().read(true).write(true).create(true)
            .truncate(true).open(path)?;
        file.write_all(&self.data)?;
        file.flush()?;
        for m in self.block_modified.iter_mut() { *m = false; }
        self.file = Some(file);
        info!("Saved flash image `{}`.", path.display());
        Ok(())
    }

    /// Loads a raw payload into the page data areas starting at the given
    /// data offset, fixing the ECC of every touched page.
    pub fn load_file(&mut self, offset: u32, path: &Path) -> Result<u32, PhxError> {
        let mut file = File::open(path)?;
        let page_data_size = (self.metrics.page_size & !0x7F) as u32;
        let mut offset = offset;
        let start = offset;
        loop {
            let page = offset / page_data_size;
            let pageoff = offset % page_data_size;
            if page >= self.metrics.num_pages {
                warn!("Preload image(s) too large.");
                break;
            }
            let base = page as usize * self.metrics.page_size as usize + pageoff as usize;
            let readsize = (page_data_size - pageoff) as usize;
            let n = file.read(&mut self.data[base..base + readsize])?;
            if n == 0 { break; }
            self.ecc_fix(page);
            offset += n as u32;
        }
        Ok(offset - start)
    }

    /// Recomputes the spare-area ECC bytes of one page.
    pub fn ecc_fix(&mut self, page: u32) {
        let base = page as usize * self.metrics.page_size as usize;
        if self.metrics.page_size < 0x800 {
            let ecc = ecc_calculate(&self.data[base..base + 512]);
            self.data[base + 0x206] = (ecc >> 6) as u8;
            self.data[base + 0x207] = (ecc >> 14) as u8;
            self.data[base + 0x208] = (ecc >> 22 | ecc << 2) as u8;
        } else {
            for i in 0..4 {
                let ecc = ecc_calculate(&self.data[base + i * 0x200..base + i * 0x200 + 512]);
                self.data[base + 0x808 + i * 0x10] = (ecc >> 6) as u8;
                self.data[base + 0x809 + i * 0x10] = (ecc >> 14) as u8;
                self.data[base + 0x80A + i * 0x10] = (ecc >> 22 | ecc << 2) as u8;
            }
        }
    }

    /// The chip parameters.
    pub fn metrics(&self) -> &NandMetrics { &self.metrics }

    /// The raw page array.
    pub fn data(&self) -> &[u8] { &self.data }

    /// Mutable access to the raw page array (loader and tests).
    pub fn data_mut(&mut self) -> &mut [u8] { &mut self.data }

    /// The current command state.
    pub fn state(&self) -> NandState { self.state }

    /// The current page row.
    pub fn row(&self) -> u32 { self.row }

    /// The current in-page column.
    pub fn column(&self) -> u32 { self.column }

    /// Whether program/erase operations are allowed.
    pub fn writable(&self) -> bool { self.writable }

    /// Sets the write-protect state (driven by the controller).
    pub fn set_writable(&mut self, writable: bool) { self.writable = writable; }

    /// Whether the given block has been modified since the last flush.
    pub fn is_block_modified(&self, block: u32) -> bool {
        self.block_modified.get(block as usize).copied().unwrap_or(false)
    }

    fn page_size(&self) -> usize { self.metrics.page_size as usize }

    /// Feeds one command byte to the chip.
    pub fn write_command_byte(&mut self, command: u8) -> Result<(), PhxError> {
        match command {
            0x01 | 0x50 if self.metrics.page_size >= 0x800 => {
                warn!("Unknown NAND command {:#04X}", command);
            }
            0x00 | 0x01 | 0x50 => {
                self.area_pointer = if command == 0x50 { 2 } else { command };
                self.addr_state = 0;
                self.state = NandState::Read;
            }
            0x10 => {
                if self.state == NandState::Program {
                    if !self.writable {
                        return Err(PhxError::NandWriteProtected(command));
                    }
                    let base = self.row as usize * self.page_size() + self.column as usize;
                    let pagedata = &mut self.data[base..base + self.buffer_pos];
                    for (dst, src) in pagedata.iter_mut().zip(self.buffer.iter()) {
                        *dst &= *src;
                    }
                    let block = self.row >> self.metrics.log2_pages_per_block;
                    self.block_modified[block as usize] = true;
                    self.state = NandState::Idle;
                }
            }
            0x30 => {
                // Read confirm on large-page chips; the read state is
                // already entered by command 0x00.
            }
            0x60 => {
                self.addr_state = 2;
                self.state = NandState::EraseSetup;
            }
            0x80 => {
                self.buffer_pos = 0;
                self.addr_state = 0;
                self.state = NandState::Program;
            }
            0xD0 => {
                if self.state == NandState::EraseSetup {
                    if !self.writable {
                        return Err(PhxError::NandWriteProtected(command));
                    }
                    let block_bits = (1 << self.metrics.log2_pages_per_block) - 1;
                    if self.row & block_bits != 0 {
                        warn!("NAND flash: erase nonexistent block {:#X}", self.row);
                        self.row &= !block_bits; // Assume extra bits ignored like read
                    }
                    let base = self.row as usize * self.page_size();
                    let len = self.page_size() << self.metrics.log2_pages_per_block;
                    for b in self.data[base..base + len].iter_mut() { *b = 0xFF; }
                    let block = self.row >> self.metrics.log2_pages_per_block;
                    self.block_modified[block as usize] = true;
                    self.state = NandState::Idle;
                }
            }
            0xFF => {
                self.row = 0;
                self.column = 0;
                self.area_pointer = 0;
                self.addr_state = 6;
                self.state = NandState::Idle;
            }
            0x70 => {
                self.addr_state = 6;
                self.state = NandState::Status;
            }
            0x90 => {
                self.addr_state = 6;
                self.state = NandState::ReadIdManuf;
            }
            _ => warn!("Unknown NAND command {:#04X}", command),
        }
        Ok(())
    }

    /// Feeds one address byte to the chip.
    pub fn write_address_byte(&mut self, byte: u8) {
        if self.addr_state >= 6 {
            return;
        }
        let current = self.addr_state;
        self.addr_state += 1;
        match current {
            0 => {
                if self.metrics.page_size < 0x800 {
                    // High bits of the column come from whether the 00, 01,
                    // or 50 command was used.
                    self.column = (self.area_pointer as u32) << 8;
                    self.addr_state = 2;
                    // Docs imply that an 01 command is only effective once.
                    self.area_pointer &= !1;
                }
                self.column = (self.column & !0xFF) | byte as u32;
            }
            1 => {
                self.column = (self.column & 0xFF) | (byte as u32) << 8;
            }
            _ => {
                let bit = (self.addr_state - 3) as u32 * 8;
                self.row = (self.row & !(0xFF << bit)) | (byte as u32) << bit;
                self.row &= self.metrics.num_pages - 1;
            }
        }
    }

    /// Reads one data byte from the chip.
    pub fn read_data_byte(&mut self) -> u8 {
        match self.state {
            NandState::Read => {
                if self.column as usize >= self.page_size() {
                    return 0;
                }
                let b = self.data[self.row as usize * self.page_size() + self.column as usize];
                self.column += 1;
                b
            }
            NandState::Status => 0x40 | (self.writable as u8) << 7,
            NandState::ReadIdManuf => {
                self.state = NandState::ReadIdModel;
                self.metrics.chip_manuf
            }
            NandState::ReadIdModel => {
                self.state = NandState::Idle;
                self.metrics.chip_model
            }
            _ => 0,
        }
    }

    /// Reads one data word from the chip.
    pub fn read_data_word(&mut self) -> u32 {
        match self.state {
            NandState::Read => {
                if self.column as usize + 4 > self.page_size() {
                    return 0;
                }
                let base = self.row as usize * self.page_size() + self.column as usize;
                self.column += 4;
                LittleEndian::read_u32(&self.data[base..])
            }
            NandState::Status => 0x40 | (self.writable as u32) << 7,
            NandState::ReadIdManuf => {
                self.state = NandState::Idle;
                (self.metrics.chip_model as u32) << 8 | self.metrics.chip_manuf as u32
            }
            _ => 0,
        }
    }

    /// Writes one data byte into the transfer buffer.
    pub fn write_data_byte(&mut self, value: u8) {
        match self.state {
            NandState::Program => {
                if self.buffer_pos + self.column as usize >= self.page_size() {
                    warn!("NAND write past end of page");
                } else {
                    self.buffer[self.buffer_pos] = value;
                    self.buffer_pos += 1;
                }
            }
            _ => warn!("NAND write in state {:#04X}", self.state as u8),
        }
    }

    /// Writes one data word into the transfer buffer.
    pub fn write_data_word(&mut self, value: u32) {
        match self.state {
            NandState::Program => {
                if self.buffer_pos + self.column as usize + 4 > self.page_size() {
                    warn!("NAND write past end of page");
                } else {
                    LittleEndian::write_u32(&mut self.buffer[self.buffer_pos..], value);
                    self.buffer_pos += 4;
                }
            }
            _ => warn!("NAND write in state {:#04X}", self.state as u8),
        }
    }
}


fn parity(word: u32) -> u32 {
    let mut word = word;
    word ^= word >> 16;
    word ^= word >> 8;
    word ^= word >> 4;
    0x6996 >> (word & 15) & 1
}

/// Computes the 24-bit ECC of a 512-byte region.
///
/// Column parities come from repeated XOR-halving of the 128 words down
/// to one accumulator per power-of-two fold; the remaining word yields
/// the row parities through five interleave masks. Parity bits are packed
/// two at a time as `(p, !p)` via the final inversion mask.
pub fn ecc_calculate(page: &[u8]) -> u32 {
    let mut buf = [0u32; 128];
    for (i, word) in buf.iter_mut().enumerate() {
        *word = LittleEndian::read_u32(&page[i * 4..]);
    }

    let mut ecc = 0u32;
    let mut len = 128;
    while len > 1 {
        let half = len / 2;
        let mut words = 0;
        for i in 0..half {
            words ^= buf[i];
            buf[i] ^= buf[i + half];
        }
        ecc = ecc << 2 | parity(words);
        len = half;
    }

    let words = buf[0];
    ecc = ecc << 2 | parity(words & 0x0000FFFF);
    ecc = ecc << 2 | parity(words & 0x00FF00FF);
    ecc = ecc << 2 | parity(words & 0x0F0F0F0F);
    ecc = ecc << 2 | parity(words & 0x33333333);
    ecc = ecc << 2 | parity(words & 0x55555555);
    (ecc | ecc << 1) ^ if parity(words) != 0 { 0x555555 } else { 0xFFFFFF }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn feed_read_address(nand: &mut NandFlash, column: u8, row: u32) {
        nand.write_address_byte(column);
        nand.write_address_byte(row as u8);
        nand.write_address_byte((row >> 8) as u8);
    }

    #[test]
    fn small_page_read_sequence() {
        let mut nand = NandFlash::new(false);
        nand.data[0..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);

        nand.write_command_byte(0x00).unwrap();
        feed_read_address(&mut nand, 0, 0);
        let bytes: Vec<u8> = (0..8).map(|_| nand.read_data_byte()).collect();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(nand.column(), 8);
    }

    #[test]
    fn spare_area_read_uses_area_pointer() {
        let mut nand = NandFlash::new(false);
        nand.data[0x200] = 0xAB;
        nand.write_command_byte(0x50).unwrap();
        feed_read_address(&mut nand, 0, 0);
        assert_eq!(nand.column(), 0x200);
        assert_eq!(nand.read_data_byte(), 0xAB);
    }

    #[test]
    fn read_past_page_end_returns_zero() {
        let mut nand = NandFlash::new(false);
        nand.write_command_byte(0x00).unwrap();
        feed_read_address(&mut nand, 0x0F, 0);
        nand.column = 0x20F;
        assert_eq!(nand.read_data_byte(), 0xFF);
        assert_eq!(nand.read_data_byte(), 0);
        assert_eq!(nand.column(), 0x210);
    }

    #[test]
    fn read_id_returns_manuf_then_model() {
        let mut nand = NandFlash::new(true);
        nand.write_command_byte(0x90).unwrap();
        assert_eq!(nand.read_data_byte(), 0xEC);
        assert_eq!(nand.read_data_byte(), 0xA1);
        assert_eq!(nand.state(), NandState::Idle);
    }

    #[test]
    fn status_reflects_write_protect() {
        let mut nand = NandFlash::new(false);
        nand.write_command_byte(0x70).unwrap();
        assert_eq!(nand.read_data_byte(), 0xC0);
        nand.set_writable(false);
        assert_eq!(nand.read_data_byte(), 0x40);
    }

    #[test]
    fn reset_clears_addressing_state() {
        let mut nand = NandFlash::new(false);
        nand.write_command_byte(0x00).unwrap();
        feed_read_address(&mut nand, 4, 0x123);
        nand.read_data_byte();
        nand.write_command_byte(0xFF).unwrap();
        assert_eq!(nand.state(), NandState::Idle);
        assert_eq!(nand.row(), 0);
        assert_eq!(nand.column(), 0);
    }

    #[test]
    fn program_ands_buffer_onto_page_and_marks_block() {
        let mut nand = NandFlash::new(false);
        nand.write_command_byte(0x80).unwrap();
        for _ in 0..5 { nand.write_address_byte(0); }
        for i in 0..512 { nand.write_data_byte(i as u8); }
        nand.write_command_byte(0x10).unwrap();

        assert_eq!(nand.state(), NandState::Idle);
        assert!(nand.is_block_modified(0));
        for i in 0..512 {
            assert_eq!(nand.data()[i], i as u8);
        }
        // Untouched bytes of the page stay erased.
        assert_eq!(nand.data()[512], 0xFF);
    }

    #[test]
    fn program_with_write_protect_is_fatal() {
        let mut nand = NandFlash::new(false);
        nand.set_writable(false);
        nand.write_command_byte(0x80).unwrap();
        for _ in 0..3 { nand.write_address_byte(0); }
        nand.write_data_byte(0);
        assert!(nand.write_command_byte(0x10).is_err());
    }

    #[test]
    fn erase_fills_block_with_ff() {
        let mut nand = NandFlash::new(false);
        let block_len = 0x210usize << 5;
        for b in nand.data[..block_len].iter_mut() { *b = 0; }

        nand.write_command_byte(0x60).unwrap();
        nand.write_address_byte(0);
        nand.write_address_byte(0);
        nand.write_command_byte(0xD0).unwrap();

        assert!(nand.data()[..block_len].iter().all(|&b| b == 0xFF));
        assert!(nand.is_block_modified(0));
        assert_eq!(nand.state(), NandState::Idle);
    }

    #[test]
    fn erase_masks_extra_row_bits() {
        let mut nand = NandFlash::new(false);
        nand.write_command_byte(0x60).unwrap();
        nand.write_address_byte(0x21); // block 1, plus one stray page bit
        nand.write_address_byte(0);
        nand.write_command_byte(0xD0).unwrap();
        assert!(nand.is_block_modified(1));
        assert!(!nand.is_block_modified(0));
    }

    #[test]
    fn ecc_known_answers_and_sensitivity() {
        let zeroes = [0u8; 512];
        let ones = [0xFFu8; 512];
        assert_eq!(ecc_calculate(&zeroes), 0xFFFFFF);
        assert_eq!(ecc_calculate(&ones), 0xFFFFFF);

        let mut page = [0u8; 512];
        page[17] = 0x55;
        let reference = ecc_calculate(&page);
        assert_eq!(ecc_calculate(&page), reference);

        for byte in [0usize, 17, 205, 511] {
            for bit in 0..8 {
                let mut flipped = page;
                flipped[byte] ^= 1 << bit;
                assert_ne!(ecc_calculate(&flipped), reference,
                           "flip of byte {} bit {} went unnoticed", byte, bit);
            }
        }
    }

    #[test]
    fn created_image_settings_round_trip() {
        let nand = NandFlash::create_new(true, 0x0F0, true, None, None).unwrap();
        assert_eq!(LittleEndian::read_u32(&nand.data()[0..]), FLASH_MAGIC);
        let settings = nand.read_settings().unwrap();
        assert_eq!(settings.product, 0x0F0);
        // 0xFC018012: (2 & 7) + (2 & 7) = 4 -> 64 MiB.
        assert_eq!(settings.sdram_size, 64 * 1024 * 1024);

        let small = NandFlash::create_new(false, 0x100, false, None, None).unwrap();
        assert_eq!(small.read_settings().unwrap().sdram_size, 32 * 1024 * 1024);
    }
}


/*
Licensed to the Apache Software Foundation (ASF) under one
or more contributor license agreements.  See the NOTICE file
distributed with this work for additional information
regarding copyright ownership.  The ASF licenses this file
to you under the Apache License, Version 2.0 (the
"License"); you may not use this file except in compliance
with the License.  You may obtain a copy of the License at

  http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing,
software distributed under the License is distributed on an
"AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
KIND, either express or implied.  See the License for the
specific language governing permissions and limitations
under the License.
*/
