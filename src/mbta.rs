// Client for https://api-v3.mbta.com/predictions
//
// Only the first two prediction records matter. Each record is decoded on its
// own so that a broken second record can't take down a good first one.
extern crate chrono;
extern crate serde;
extern crate serde_json;

use crate::arrival;
use crate::config;
use crate::fetch;
use crate::result;

use crate::arrival::ArrivalOffset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationArrivals {
    pub first: ArrivalOffset,
    pub second: ArrivalOffset,
}

impl StationArrivals {
    pub fn no_data() -> StationArrivals {
        return StationArrivals{
            first: ArrivalOffset::NoData,
            second: ArrivalOffset::NoData,
        };
    }
}

#[derive(Deserialize, Debug)]
struct MbtaPredictionsPage {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct MbtaPrediction {
    attributes: MbtaPredictionAttributes,
}

#[derive(Deserialize, Debug)]
struct MbtaPredictionAttributes {
    arrival_time: Option<String>,
}

fn parse_predictions(response_body: &str) -> result::DashResult<Vec<serde_json::Value>> {
    let page: MbtaPredictionsPage = serde_json::from_str(response_body)?;
    return Ok(page.data.into_iter().take(2).collect());
}

fn arrival_time(record: &serde_json::Value) -> result::DashResult<String> {
    let prediction: MbtaPrediction = serde_json::from_value(record.clone())?;
    return prediction.attributes.arrival_time
        .ok_or(result::make_error("prediction has no arrival_time"));
}

fn offset_for_record(station: &config::Station, slot: usize, record: Option<&serde_json::Value>, now: &chrono::NaiveDateTime) -> ArrivalOffset {
    let record = match record {
        Some(record) => record,
        None => return ArrivalOffset::NoData,
    };

    match arrival_time(record) {
        Ok(iso) => {
            let offset = arrival::minutes_until(now, &iso);
            debug!("{} train {}: {} ({:?})",
                   station.name, slot, arrival::arrival_clock_label(&iso), offset);
            return offset;
        },
        Err(err) => {
            warn!("{} train {}: unusable prediction: {}", station.name, slot, err);
            return ArrivalOffset::Malformed;
        },
    }
}

// Never fails: transport and payload problems come back as NoData slots.
pub fn poll(fetcher: &dyn fetch::Fetcher, station: &config::Station, now: &chrono::NaiveDateTime) -> StationArrivals {
    info!("Getting arrival times for {}", station.name);

    let records = match fetcher.get(&station.endpoint).and_then(|body| parse_predictions(&body)) {
        Ok(records) => records,
        Err(err) => {
            let kind = if err.is_transport() {
                "transport"
            } else if err.is_payload() {
                "payload"
            } else {
                "fetch"
            };
            error!("Error fetching data for {} ({}): {}", station.name, kind, err);
            return StationArrivals::no_data();
        },
    };

    return StationArrivals{
        first: offset_for_record(station, 1, records.get(0), now),
        second: offset_for_record(station, 2, records.get(1), now),
    };
}
