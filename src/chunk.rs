/*!
 * Cutting a dataset into chunks of rows.
 *
 * Chunks are contiguous, disjoint ranges of row indexes that together cover every row exactly
 * once.
 * With [Partitioning::RowCount](crate::Partitioning::RowCount) nothing about the rows is
 * considered, so a vessel whose reports straddle a boundary has the step across that boundary
 * silently skipped.
 */

use crate::report::RawReport;
use std::ops::Range;

/**
 * Split `total_rows` rows into chunks of `ceil(total_rows / chunk_count)` rows.
 *
 * The last chunk may be smaller, and when the rows don't divide evenly there may be fewer than
 * `chunk_count` chunks. A `chunk_count` of zero is treated as one.
 */
pub fn partition_rows(total_rows: usize, chunk_count: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size(total_rows, chunk_count);

    (0..total_rows)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(total_rows))
        .collect()
}

/**
 * Like [partition_rows], but every boundary is pushed forward until it falls between two vessels.
 *
 * The rows must already have each vessel's reports next to each other, see [order_by_vessel].
 */
pub fn partition_rows_by_vessel(rows: &[RawReport], chunk_count: usize) -> Vec<Range<usize>> {
    let total_rows = rows.len();
    let chunk_size = chunk_size(total_rows, chunk_count);

    let mut chunks = Vec::with_capacity(chunk_count.min(total_rows));
    let mut start = 0;
    while start < total_rows {
        let mut end = (start + chunk_size).min(total_rows);
        while end < total_rows && vessel_key(&rows[end]) == vessel_key(&rows[end - 1]) {
            end += 1;
        }

        chunks.push(start..end);
        start = end;
    }

    chunks
}

/// `ceil(total_rows / chunk_count)`, at least one, for any `chunk_count`.
fn chunk_size(total_rows: usize, chunk_count: usize) -> usize {
    let chunk_count = chunk_count.max(1);
    let size = total_rows / chunk_count + usize::from(total_rows % chunk_count != 0);
    size.max(1)
}

/// Stable sort so each vessel's rows are adjacent, keeping their order within the vessel.
pub fn order_by_vessel(rows: &mut [RawReport]) {
    rows.sort_by(|left, right| vessel_key(left).cmp(&vessel_key(right)));
}

/// Rows with an identity that won't parse still need to group together, so fall back to the text.
fn vessel_key(row: &RawReport) -> (Option<u32>, &str) {
    let text = row.mmsi.trim();
    match text.parse() {
        Ok(mmsi) => (Some(mmsi), ""),
        Err(_) => (None, text),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_covers(chunks: &[Range<usize>], total_rows: usize) {
        let mut next = 0;
        for chunk in chunks {
            assert_eq!(chunk.start, next);
            assert!(chunk.end > chunk.start);
            next = chunk.end;
        }
        assert_eq!(next, total_rows);
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), total_rows);
    }

    #[test]
    fn test_partition_rows_sizes() {
        let chunks = partition_rows(10, 4);
        assert_eq!(chunks, vec![0..3, 3..6, 6..9, 9..10]);

        // 9 rows at 3 per chunk only needs 3 chunks.
        let chunks = partition_rows(9, 4);
        assert_eq!(chunks, vec![0..3, 3..6, 6..9]);

        assert_eq!(partition_rows(5, 1), vec![0..5]);
        assert_eq!(partition_rows(3, 8), vec![0..1, 1..2, 2..3]);
        assert_eq!(partition_rows(3, 0), vec![0..3]);
        assert!(partition_rows(0, 4).is_empty());
    }

    #[test]
    fn test_partition_rows_covers_everything() {
        for total in 0..60 {
            for count in 1..12 {
                let chunks = partition_rows(total, count);
                assert!(chunks.len() <= count);
                assert_covers(&chunks, total);
            }
        }
    }

    fn rows(ids: &[&str]) -> Vec<RawReport> {
        ids.iter()
            .map(|id| RawReport {
                mmsi: id.to_string(),
                ..RawReport::default()
            })
            .collect()
    }

    #[test]
    fn test_order_by_vessel_is_stable() {
        let mut data = rows(&["3", "1", "x", "3", " 1", "2", "x"]);
        for (i, row) in data.iter_mut().enumerate() {
            row.latitude = i.to_string();
        }

        order_by_vessel(&mut data);

        let order: Vec<(&str, &str)> = data
            .iter()
            .map(|r| (r.mmsi.trim(), r.latitude.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("x", "2"),
                ("x", "6"),
                ("1", "1"),
                ("1", "4"),
                ("2", "5"),
                ("3", "0"),
                ("3", "3")
            ]
        );
    }

    #[test]
    fn test_vessel_aware_boundaries() {
        let data = rows(&["1", "1", "1", "2", "2", "3", "4", "4", "4", "4"]);

        let chunks = partition_rows_by_vessel(&data, 4);
        assert_eq!(chunks, vec![0..3, 3..6, 6..10]);
        assert_covers(&chunks, data.len());

        for chunk in &chunks {
            if chunk.end < data.len() {
                assert_ne!(data[chunk.end - 1].mmsi, data[chunk.end].mmsi);
            }
        }

        let one_vessel = rows(&["9"; 7]);
        assert_eq!(partition_rows_by_vessel(&one_vessel, 3), vec![0..7]);
        assert!(partition_rows_by_vessel(&[], 3).is_empty());
    }

    #[test]
    fn test_huge_chunk_counts() {
        let data = rows(&["1", "2", "3"]);

        for count in [usize::MAX / 2, usize::MAX] {
            assert_eq!(partition_rows_by_vessel(&data, count), vec![0..1, 1..2, 2..3]);
            assert_eq!(partition_rows(3, count), vec![0..1, 1..2, 2..3]);
        }
    }
}
