// src/derive/geo.rs
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::warn;

use crate::{
    error::Result,
    select::CITY_PREFIX,
    table::{parse, Table},
};

/// Number of cities on the reader-locations chart.
pub const TOP_CITIES: usize = 10;

pub const CITY_FIELD: &str = "City";
pub const READERS_FIELD: &str = "Readers";

#[derive(Debug, Clone, PartialEq)]
pub struct CityReaders {
    pub city: String,
    pub readers: f64,
}

/// Cities ranked by summed readers, largest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoDistribution {
    pub cities: Vec<CityReaders>,
}

impl GeoDistribution {
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn to_batch(&self) -> Result<RecordBatch> {
        let schema = Schema::new(vec![
            Field::new(CITY_FIELD, DataType::Utf8, false),
            Field::new(READERS_FIELD, DataType::Float64, false),
        ]);
        let cities = StringArray::from_iter_values(self.cities.iter().map(|c| c.city.as_str()));
        let readers = Float64Array::from_iter_values(self.cities.iter().map(|c| c.readers));
        Ok(RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(cities) as ArrayRef, Arc::new(readers) as ArrayRef],
        )?)
    }
}

/// Top cities by readers over the whole page table.
///
/// Every column carrying the city marker is summed; missing and non-numeric
/// cells count as zero. Ties keep the column order of the table. Asking for
/// more cities than exist returns the ones there are.
pub fn geo_distribution(page: &Table, limit: usize) -> GeoDistribution {
    let batch = page.batch();
    let mut cities = Vec::new();
    let mut malformed = 0usize;

    for (field, column) in batch.schema_ref().fields().iter().zip(batch.columns()) {
        let Some(pos) = field.name().find(CITY_PREFIX) else {
            continue;
        };
        let city = field.name()[pos + CITY_PREFIX.len()..].to_string();

        let readers = match column.as_any().downcast_ref::<StringArray>() {
            Some(cells) => cells
                .iter()
                .flatten()
                .map(|cell| match parse::parse_number(cell) {
                    Some(v) => v,
                    None => {
                        if !parse::clean_str(cell).is_empty() {
                            malformed += 1;
                        }
                        0.0
                    }
                })
                .sum::<f64>(),
            None => {
                warn!(column = %field.name(), "geography column is not text; counted as zero");
                0.0
            }
        };
        cities.push(CityReaders { city, readers });
    }

    if malformed > 0 {
        warn!(malformed, "non-numeric geography cells counted as zero");
    }
    if cities.is_empty() && page.num_rows() > 0 {
        warn!("page table has no geography columns");
    }

    // stable: equal sums keep column order
    cities.sort_by(|a, b| b.readers.total_cmp(&a.readers));
    cities.truncate(limit);
    GeoDistribution { cities }
}
