//! Live mount table parsing.
//!
//! The MMC classifier must never unbind a card that backs a mounted
//! filesystem. This module turns `/proc/self/mounts` content into a queryable
//! table and answers "is this block device, or any partition of it, mounted".

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub target: String,
    pub fstype: String,
}

/// Parsed mount table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    /// Parse `/proc/self/mounts` content.
    ///
    /// Lines with fewer than three fields are ignored. Octal escapes
    /// (`\040` for space and friends) are decoded.
    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let source = fields.next()?;
                let target = fields.next()?;
                let fstype = fields.next()?;
                Some(MountEntry {
                    source: unescape(source),
                    target: unescape(target),
                    fstype: unescape(fstype),
                })
            })
            .collect();
        Self { entries }
    }

    /// All entries, in table order.
    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// Whether `block` (e.g. `mmcblk0`) or one of its partitions is the source
    /// of any mount.
    pub fn backs_mount(&self, block: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| source_is_block_or_partition(&entry.source, block))
    }
}

/// `/dev/mmcblk0` and `/dev/mmcblk0p3` both count for `mmcblk0`.
fn source_is_block_or_partition(source: &str, block: &str) -> bool {
    let Some(name) = source.strip_prefix("/dev/") else {
        return false;
    };
    let Some(rest) = name.strip_prefix(block) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    // mmcblk0boot0 / mmcblk0rpmb are hardware partitions of the same card
    let suffix = rest
        .strip_prefix('p')
        .or_else(|| rest.strip_prefix("boot"))
        .unwrap_or("");
    !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
}

fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let octal = &bytes[i + 1..i + 4];
            if octal.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = octal.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    const SAMPLE: &str = "\
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/mmcblk0p1 /run/media/user/SD\\040CARD vfat rw 0 0
";

    #[test]
    fn test_parse_sample() {
        let table = MountTable::parse(SAMPLE);
        assert_eq!(table.entries().len(), 3);
        assert_eq!(table.entries()[0].target, "/");
        assert_eq!(table.entries()[2].target, "/run/media/user/SD CARD");
        assert_eq!(table.entries()[2].fstype, "vfat");
    }

    #[test]
    fn test_ignores_short_lines() {
        let table = MountTable::parse("garbage\n\n/dev/sda1 /boot\n");
        assert!(table.entries().is_empty());
    }

    #[rstest]
    #[case("/dev/mmcblk0", "mmcblk0", true)]
    #[case("/dev/mmcblk0p1", "mmcblk0", true)]
    #[case("/dev/mmcblk0p12", "mmcblk0", true)]
    #[case("/dev/mmcblk0boot0", "mmcblk0", true)]
    #[case("/dev/mmcblk1p1", "mmcblk0", false)]
    #[case("/dev/mmcblk10", "mmcblk1", false)]
    #[case("/dev/mmcblk0px", "mmcblk0", false)]
    #[case("mmcblk0", "mmcblk0", false)]
    #[case("tmpfs", "mmcblk0", false)]
    fn test_source_matching(#[case] source: &str, #[case] block: &str, #[case] expected: bool) {
        assert_eq!(source_is_block_or_partition(source, block), expected);
    }

    #[test]
    fn test_backs_mount() {
        let table = MountTable::parse(SAMPLE);
        assert!(table.backs_mount("mmcblk0"));
        assert!(table.backs_mount("nvme0n1"));
        assert!(!table.backs_mount("mmcblk1"));
    }

    proptest! {
        #[test]
        fn prop_partition_of_mounted_card_always_detected(
            partition in 1u8..64,
            noise in proptest::collection::vec("[a-z/]{1,12}", 0..8),
            position in 0usize..8,
        ) {
            let mut lines: Vec<String> = noise
                .iter()
                .map(|n| format!("tmpfs /{n} tmpfs rw 0 0"))
                .collect();
            let at = position.min(lines.len());
            lines.insert(at, format!("/dev/mmcblk0p{partition} /mnt/sd vfat rw 0 0"));

            let table = MountTable::parse(&lines.join("\n"));
            prop_assert!(table.backs_mount("mmcblk0"));
        }
    }
}
