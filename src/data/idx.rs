/// Parse a pair of IDX binary files (image + label) as used by MNIST and
/// its derivatives into `(images, labels)`.
///
/// # IDX3 image file layout
/// ```text
/// bytes  0-1:   0x00 0x00   (reserved, must be zero)
/// byte   2:     0x08        (dtype = uint8)
/// byte   3:     0x03        (number of dimensions = 3)
/// bytes  4-7:   N           (number of images, big-endian u32)
/// bytes  8-11:  rows        (image height in pixels, big-endian u32)
/// bytes 12-15:  cols        (image width in pixels, big-endian u32)
/// bytes 16..:   N * rows * cols bytes, row-major, uint8
/// ```
///
/// The IDX1 label file has the same two-byte reserved prefix, dtype 0x08,
/// dimension count 1, a big-endian u32 item count, then one class byte per
/// item.
///
/// Returns `(images, labels)` where `images[i]` is a flat `Vec<f64>` of
/// length `rows * cols` with each pixel divided by 255.0, and `labels[i]`
/// is the raw class byte.
pub fn parse_idx_pair(
    image_bytes: &[u8],
    label_bytes: &[u8],
) -> Result<(Vec<Vec<f64>>, Vec<u8>), String> {
    // ── Image file validation ───────────────────────────────────────────────

    if image_bytes.len() < 16 {
        return Err(format!(
            "IDX image file too short: expected at least 16 header bytes, got {}.",
            image_bytes.len()
        ));
    }
    if image_bytes[0] != 0x00 || image_bytes[1] != 0x00 || image_bytes[2] != 0x08 {
        return Err(format!(
            "IDX image file: header must begin 0x00 0x00 0x08, got 0x{:02X} 0x{:02X} 0x{:02X}.",
            image_bytes[0], image_bytes[1], image_bytes[2]
        ));
    }
    if image_bytes[3] != 0x03 {
        return Err(format!(
            "IDX image file: byte 3 (dimensions) must be 3, got {}. \
             This does not appear to be an IDX3 image file.",
            image_bytes[3]
        ));
    }

    let n_items = u32::from_be_bytes([
        image_bytes[4],
        image_bytes[5],
        image_bytes[6],
        image_bytes[7],
    ]) as usize;
    let rows = u32::from_be_bytes([
        image_bytes[8],
        image_bytes[9],
        image_bytes[10],
        image_bytes[11],
    ]) as usize;
    let cols = u32::from_be_bytes([
        image_bytes[12],
        image_bytes[13],
        image_bytes[14],
        image_bytes[15],
    ]) as usize;

    let n_pixels = rows
        .checked_mul(cols)
        .ok_or_else(|| format!("IDX image file: rows * cols overflows (rows={}, cols={}).", rows, cols))?;
    let data_len = n_items
        .checked_mul(n_pixels)
        .ok_or_else(|| "IDX image file: data length overflows usize.".to_owned())?;
    if image_bytes.len() < 16 + data_len {
        return Err(format!(
            "IDX image file too short: header declares {} items of {}×{} pixels, \
             but file is only {} bytes total.",
            n_items,
            rows,
            cols,
            image_bytes.len()
        ));
    }

    // ── Label file validation ───────────────────────────────────────────────

    if label_bytes.len() < 8 {
        return Err(format!(
            "IDX label file too short: expected at least 8 header bytes, got {}.",
            label_bytes.len()
        ));
    }
    if label_bytes[0] != 0x00 || label_bytes[1] != 0x00 || label_bytes[2] != 0x08 {
        return Err(format!(
            "IDX label file: header must begin 0x00 0x00 0x08, got 0x{:02X} 0x{:02X} 0x{:02X}.",
            label_bytes[0], label_bytes[1], label_bytes[2]
        ));
    }
    if label_bytes[3] != 0x01 {
        return Err(format!(
            "IDX label file: byte 3 (dimensions) must be 1, got {}. \
             This does not appear to be an IDX1 label file.",
            label_bytes[3]
        ));
    }

    let label_count = u32::from_be_bytes([
        label_bytes[4],
        label_bytes[5],
        label_bytes[6],
        label_bytes[7],
    ]) as usize;
    if label_count != n_items {
        return Err(format!(
            "IDX file mismatch: image file declares {} items but label file declares {}.",
            n_items, label_count
        ));
    }
    if label_bytes.len() < 8 + n_items {
        return Err(format!(
            "IDX label file too short: header declares {} labels but file is only {} bytes.",
            n_items,
            label_bytes.len()
        ));
    }

    // ── Build outputs ───────────────────────────────────────────────────────

    let images = image_bytes[16..16 + data_len]
        .chunks_exact(n_pixels)
        .map(|chunk| chunk.iter().map(|&px| px as f64 / 255.0).collect())
        .collect();
    let labels = label_bytes[8..8 + n_items].to_vec();

    Ok((images, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx3(n: usize, rows: usize, cols: usize, fill: u8) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x08, 0x03];
        bytes.extend((n as u32).to_be_bytes());
        bytes.extend((rows as u32).to_be_bytes());
        bytes.extend((cols as u32).to_be_bytes());
        bytes.extend(vec![fill; n * rows * cols]);
        bytes
    }

    fn idx1(labels: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x08, 0x01];
        bytes.extend((labels.len() as u32).to_be_bytes());
        bytes.extend(labels);
        bytes
    }

    #[test]
    fn parses_a_valid_pair() {
        let (images, labels) = parse_idx_pair(&idx3(3, 2, 2, 255), &idx1(&[7, 0, 3])).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0], vec![1.0; 4]);
        assert_eq!(labels, vec![7, 0, 3]);
    }

    #[test]
    fn rejects_item_count_mismatch() {
        let err = parse_idx_pair(&idx3(3, 2, 2, 0), &idx1(&[1, 2])).unwrap_err();
        assert!(err.contains("mismatch"), "unexpected error: {}", err);
    }

    #[test]
    fn rejects_wrong_dimension_byte() {
        let mut bad = idx3(1, 2, 2, 0);
        bad[3] = 0x01;
        assert!(parse_idx_pair(&bad, &idx1(&[0])).is_err());
    }

    #[test]
    fn rejects_truncated_image_data() {
        let mut bytes = idx3(2, 4, 4, 9);
        bytes.truncate(bytes.len() - 5);
        assert!(parse_idx_pair(&bytes, &idx1(&[1, 2])).is_err());
    }
}
