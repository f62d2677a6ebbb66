use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::ptu::{bucket_index, PTUS_PER_DAY};

/// Consumption of one consumer over one calendar day, split by PTU.
///
/// The PTU values are shared between states: updating a day allocates a new array for that day
/// only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyConsumption {
    date: NaiveDate,
    #[serde(serialize_with = "serialize_ptu_values", deserialize_with = "deserialize_ptu_values")]
    ptu_values: Arc<[u64; PTUS_PER_DAY]>,
}

impl DailyConsumption {
    pub fn new(date: NaiveDate, ptu_values: [u64; PTUS_PER_DAY]) -> Self {
        Self {
            date,
            ptu_values: Arc::new(ptu_values),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn ptu_values(&self) -> &Arc<[u64; PTUS_PER_DAY]> {
        &self.ptu_values
    }

    /// Sum of every PTU of the day, in watts.
    pub fn total(&self) -> u64 {
        self.ptu_values.iter().sum()
    }
}

fn serialize_ptu_values<S: Serializer>(values: &Arc<[u64; PTUS_PER_DAY]>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter())
}

fn deserialize_ptu_values<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u64; PTUS_PER_DAY]>, D::Error> {
    let values: Vec<u64> = Vec::deserialize(deserializer)?;
    let length = values.len();

    <[u64; PTUS_PER_DAY]>::try_from(values)
        .map(Arc::new)
        .map_err(|_| de::Error::invalid_length(length, &"48 PTU values"))
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("daily consumptions must be sorted by strictly increasing date, found {found} after {previous}")]
pub struct UnsortedSnapshot {
    previous: NaiveDate,
    found: NaiveDate,
}

/// State of a consumer: its daily consumptions sorted by ascending date, without duplicates.
///
/// Serialized, it is the ordered list of `{date, ptuValues}` objects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<DailyConsumption>")]
pub struct ConsumerState {
    days: Vec<DailyConsumption>,
}

impl ConsumerState {
    pub fn days(&self) -> &[DailyConsumption] {
        &self.days
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DailyConsumption> {
        self.search(date).ok().map(|index| &self.days[index])
    }

    /// Watts recorded in the PTU containing `timestamp`, 0 when nothing was recorded.
    pub fn ptu_value(&self, timestamp: &NaiveDateTime) -> u64 {
        self.day(timestamp.date())
            .map(|day| day.ptu_values[bucket_index(timestamp)])
            .unwrap_or(0)
    }

    /// Adds `consumption` to the PTU containing `timestamp`.
    ///
    /// Only the touched day gets a new PTU array, every other day keeps pointing at the same one.
    pub fn record(mut self, timestamp: &NaiveDateTime, consumption: u32) -> Self {
        let index = bucket_index(timestamp);

        match self.search(timestamp.date()) {
            Ok(position) => {
                let day = &mut self.days[position];
                let mut values: [u64; PTUS_PER_DAY] = *day.ptu_values;
                values[index] = values[index].saturating_add(u64::from(consumption));
                day.ptu_values = Arc::new(values);
            }
            Err(position) => {
                let mut values = [0; PTUS_PER_DAY];
                values[index] = u64::from(consumption);
                self.days.insert(position, DailyConsumption::new(timestamp.date(), values));
            }
        }

        self
    }

    fn search(&self, date: NaiveDate) -> Result<usize, usize> {
        self.days.binary_search_by_key(&date, |day| day.date)
    }
}

impl Serialize for ConsumerState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.days.serialize(serializer)
    }
}

impl TryFrom<Vec<DailyConsumption>> for ConsumerState {
    type Error = UnsortedSnapshot;

    fn try_from(days: Vec<DailyConsumption>) -> Result<Self, Self::Error> {
        if let Some(pair) = days.windows(2).find(|pair| pair[0].date >= pair[1].date) {
            return Err(UnsortedSnapshot {
                previous: pair[0].date,
                found: pair[1].date,
            });
        }

        Ok(Self { days })
    }
}
