//! Decoded lstat snapshots recorded at backup time.

#![allow(missing_docs)]

use crate::core::errors::{BduError, Result};
use crate::decode::base64::{decode_token, encode_value};

/// Sector size that `blocks` is counted in, whatever `blksize` says.
pub const SECTOR_SIZE: u64 = 512;

const S_IFMT: u64 = 0o170_000;
const PERMISSION_MASK: u64 = 0o7777;

/// Field names in encoded order; the fifteenth is optional.
const FIELD_NAMES: [&str; 15] = [
    "device", "inode", "mode", "nlink", "uid", "gid", "rdev", "size", "blksize", "blocks",
    "atime", "mtime", "ctime", "linkfi", "fileindex",
];

/// File metadata as it was when the file was backed up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    pub device: u64,
    pub inode: u64,
    pub mode: u64,
    pub nlink: u64,
    pub uid: u64,
    pub gid: u64,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    /// File index of the hard-link target this entry was saved as, 0 if none.
    pub link_file_index: u64,
    pub file_index: Option<u64>,
}

/// File type derived from the `S_IFMT` bits of `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Socket,
    Symlink,
    Regular,
    BlockDevice,
    Directory,
    CharDevice,
    Fifo,
    Unknown,
}

impl FileType {
    #[must_use]
    pub const fn from_mode(mode: u64) -> Self {
        match mode & S_IFMT {
            0o140_000 => Self::Socket,
            0o120_000 => Self::Symlink,
            0o100_000 => Self::Regular,
            0o060_000 => Self::BlockDevice,
            0o040_000 => Self::Directory,
            0o020_000 => Self::CharDevice,
            0o010_000 => Self::Fifo,
            _ => Self::Unknown,
        }
    }

    /// Label in the wording stat(1) uses for `%F`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Socket => "socket",
            Self::Symlink => "symbolic link",
            Self::Regular => "regular file",
            Self::BlockDevice => "block device",
            Self::Directory => "directory",
            Self::CharDevice => "character device",
            Self::Fifo => "FIFO",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl FileStat {
    /// Decode a whitespace-separated lstat string of 14 or 15 tokens.
    ///
    /// Any malformed token aborts the decode: a default value would silently
    /// skew every total it flows into.
    pub fn decode(encoded: &str) -> Result<Self> {
        let tokens: Vec<&str> = encoded.split_whitespace().collect();
        if !(14..=15).contains(&tokens.len()) {
            return Err(BduError::decode(
                encoded,
                format!("expected 14 or 15 lstat fields, found {}", tokens.len()),
            ));
        }

        let mut values = [0u64; 15];
        for (index, token) in tokens.iter().enumerate() {
            values[index] = decode_token(token).map_err(|bad| {
                BduError::decode(encoded, format!("{} field: {bad}", FIELD_NAMES[index]))
            })?;
        }

        let [
            device,
            inode,
            mode,
            nlink,
            uid,
            gid,
            rdev,
            size,
            blksize,
            blocks,
            atime,
            mtime,
            ctime,
            link_file_index,
            file_index,
        ] = values;

        Ok(Self {
            device,
            inode,
            mode,
            nlink,
            uid,
            gid,
            rdev,
            size,
            blksize,
            blocks,
            atime,
            mtime,
            ctime,
            link_file_index,
            file_index: (tokens.len() == 15).then_some(file_index),
        })
    }

    /// Recorded size in bytes.
    #[must_use]
    pub const fn apparent_size(&self) -> u64 {
        self.size
    }

    /// Allocated bytes: `blocks` sectors of 512 bytes.
    #[must_use]
    pub const fn block_bytes(&self) -> u64 {
        self.blocks.saturating_mul(SECTOR_SIZE)
    }

    #[must_use]
    pub const fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    /// Permission bits with the type bits masked off.
    #[must_use]
    pub const fn permissions(&self) -> u64 {
        self.mode & PERMISSION_MASK
    }

    /// Device major number of `rdev`.
    #[must_use]
    pub const fn rdev_major(&self) -> u64 {
        self.rdev >> 8
    }

    /// Device minor number of `rdev`.
    #[must_use]
    pub const fn rdev_minor(&self) -> u64 {
        self.rdev & 0xff
    }

    /// Encode back into catalog form; inverse of [`FileStat::decode`].
    #[must_use]
    pub fn encode(&self) -> String {
        let fields = [
            self.device,
            self.inode,
            self.mode,
            self.nlink,
            self.uid,
            self.gid,
            self.rdev,
            self.size,
            self.blksize,
            self.blocks,
            self.atime,
            self.mtime,
            self.ctime,
            self.link_file_index,
        ];
        let mut tokens: Vec<String> = fields.iter().map(|v| encode_value(*v)).collect();
        if let Some(index) = self.file_index {
            tokens.push(encode_value(index));
        }
        tokens.join(" ")
    }
}
