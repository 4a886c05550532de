//! Stream-info join
//!
//! Writes the per-stream-id scalar back onto every raster cell belonging
//! to that id, either by filling the table's flow column or by burning a
//! streamflow raster congruent with the elevation template. The join
//! never adds or removes stream ids; only the per-row scalar changes.

use crate::sources::PeakFlows;
use floodprep_core::raster::{CellValue, Raster, NODATA_SENTINEL};
use floodprep_core::stream_info::StreamInfoTable;
use floodprep_core::{Error, Result};

/// What to do when a table id has no flow in the source.
///
/// Zero-filling lets downstream model runs proceed with no flow at the
/// unmapped reaches, which silently underestimates flood extent there;
/// aborting surfaces the gap instead. Which risk is acceptable is the
/// caller's call, so the policy travels with the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingIdPolicy {
    /// Write zero flow for unmapped ids
    #[default]
    ZeroFill,
    /// Fail the tile on the first unmapped id
    Abort,
}

/// Fill the table's flow column from the per-id mapping.
///
/// Every cell whose id is covered gets its scalar; unmapped ids follow
/// the policy. The id set and row order are left untouched.
pub fn append_flow(
    table: &mut StreamInfoTable,
    flows: &PeakFlows,
    policy: MissingIdPolicy,
) -> Result<()> {
    for cell in table.cells_mut() {
        cell.flow = match flows.get(cell.stream_id) {
            Some(value) => Some(value),
            None => match policy {
                MissingIdPolicy::ZeroFill => Some(0.0),
                MissingIdPolicy::Abort => {
                    return Err(Error::MissingStreamId {
                        stream_id: cell.stream_id,
                    })
                }
            },
        };
    }
    Ok(())
}

/// Burn a streamflow raster congruent with the template.
///
/// The output starts as all-nodata; each table cell writes its id's
/// scalar at (row, col). Under [`MissingIdPolicy::ZeroFill`] cells of
/// unmapped ids retain nodata (the raster-side rendering of "no derivable
/// flow"); under [`MissingIdPolicy::Abort`] the first unmapped id fails
/// the tile.
pub fn flow_raster<T: CellValue>(
    template: &Raster<T>,
    table: &StreamInfoTable,
    flows: &PeakFlows,
    policy: MissingIdPolicy,
) -> Result<Raster<f64>> {
    let mut output: Raster<f64> = template.like(NODATA_SENTINEL);

    for cell in table {
        let value = match flows.get(cell.stream_id) {
            Some(value) => value,
            None => match policy {
                MissingIdPolicy::ZeroFill => continue,
                MissingIdPolicy::Abort => {
                    return Err(Error::MissingStreamId {
                        stream_id: cell.stream_id,
                    })
                }
            },
        };
        output.set(cell.row as usize, cell.col as usize, value)?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use floodprep_core::stream_info::StreamCell;

    fn table_with_ids(ids: &[i32]) -> StreamInfoTable {
        StreamInfoTable::new(
            ids.iter()
                .enumerate()
                .map(|(i, &id)| StreamCell::new(i as u64, i as u32, 0, id))
                .collect(),
        )
    }

    #[test]
    fn test_id_set_unchanged_by_join() {
        let mut table = table_with_ids(&[1, 2, 2, 3]);
        let before = table.unique_ids();

        let flows: PeakFlows = [(1, 10.0), (2, 20.0), (3, 30.0)].into_iter().collect();
        append_flow(&mut table, &flows, MissingIdPolicy::Abort).unwrap();

        assert_eq!(table.unique_ids(), before);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_every_cell_of_an_id_gets_the_scalar() {
        let mut table = table_with_ids(&[7, 7, 9]);
        let flows: PeakFlows = [(7, 12.5), (9, 3.25)].into_iter().collect();
        append_flow(&mut table, &flows, MissingIdPolicy::Abort).unwrap();

        let values: Vec<f64> = table.iter().map(|c| c.flow.unwrap()).collect();
        assert_eq!(values, vec![12.5, 12.5, 3.25]);
    }

    #[test]
    fn test_zero_fill_policy() {
        let mut table = table_with_ids(&[1, 2, 3, 3]);
        let flows: PeakFlows = [(1, 10.0), (2, 20.0)].into_iter().collect();
        append_flow(&mut table, &flows, MissingIdPolicy::ZeroFill).unwrap();

        for cell in &table {
            if cell.stream_id == 3 {
                assert_eq!(cell.flow, Some(0.0));
            } else {
                assert!(cell.flow.unwrap() > 0.0);
            }
        }
    }

    #[test]
    fn test_abort_policy() {
        let mut table = table_with_ids(&[1, 2, 3]);
        let flows: PeakFlows = [(1, 10.0), (2, 20.0)].into_iter().collect();
        let err = append_flow(&mut table, &flows, MissingIdPolicy::Abort).unwrap_err();
        assert!(matches!(err, Error::MissingStreamId { stream_id: 3 }));
    }

    #[test]
    fn test_raster_join_placement() {
        let template: Raster<i32> = Raster::new(4, 5);
        let table = StreamInfoTable::new(vec![StreamCell::new(13, 2, 3, 7)]);
        let flows: PeakFlows = [(7, 12.5)].into_iter().collect();

        let out = flow_raster(&template, &table, &flows, MissingIdPolicy::Abort).unwrap();

        assert_eq!(out.get(2, 3).unwrap(), 12.5);
        for row in 0..4 {
            for col in 0..5 {
                if (row, col) != (2, 3) {
                    assert!(out.get(row, col).unwrap().is_nodata(), "({row}, {col})");
                }
            }
        }
    }

    #[test]
    fn test_raster_join_unmapped_keeps_nodata() {
        let template: Raster<i32> = Raster::new(3, 3);
        let table = StreamInfoTable::new(vec![
            StreamCell::new(0, 0, 0, 1),
            StreamCell::new(4, 1, 1, 2),
        ]);
        let flows: PeakFlows = [(1, 5.0)].into_iter().collect();

        let out = flow_raster(&template, &table, &flows, MissingIdPolicy::ZeroFill).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 5.0);
        assert!(out.get(1, 1).unwrap().is_nodata());
    }

    #[test]
    fn test_raster_join_out_of_bounds_cell() {
        let template: Raster<i32> = Raster::new(2, 2);
        let table = StreamInfoTable::new(vec![StreamCell::new(0, 5, 5, 1)]);
        let flows: PeakFlows = [(1, 5.0)].into_iter().collect();

        let err = flow_raster(&template, &table, &flows, MissingIdPolicy::Abort).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { .. }));
    }

    #[test]
    fn test_raster_output_congruent_with_template() {
        let mut template: Raster<i32> = Raster::new(3, 3);
        template.set_transform(floodprep_core::GeoTransform::new(100.0, 900.0, 30.0, -30.0));
        let table = table_with_ids(&[1]);
        let flows: PeakFlows = [(1, 1.0)].into_iter().collect();

        let out = flow_raster(&template, &table, &flows, MissingIdPolicy::Abort).unwrap();
        assert!(template.same_grid_as(&out));
    }
}
