use std::collections::{HashSet, VecDeque};

use shelfsync_core::{Region, RegionId};

use crate::error::ScraperError;
use crate::transport::{Transport, TransportRequest};
use crate::types::PickupAddressesResponse;

use super::RetailerClient;

impl<T: Transport> RetailerClient<T> {
    /// Lists every pickup region the retailer exposes, in the order the
    /// retailer returns them. Duplicate ids across store areas are dropped,
    /// first occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the request fails or the body does not parse.
    pub async fn list_regions(&self) -> Result<Vec<Region>, ScraperError> {
        let url = self.endpoint("/api/v1/addresses/pickup-addresses");
        let response: PickupAddressesResponse = self
            .get_json(TransportRequest::get(url), "pickup addresses")
            .await?;

        Ok(flatten_regions(response))
    }
}

/// Walks store areas breadth-first with an explicit visited set.
fn flatten_regions(response: PickupAddressesResponse) -> Vec<Region> {
    let mut queue: VecDeque<_> = response.store_areas.into_iter().collect();
    let mut visited: HashSet<RegionId> = HashSet::new();
    let mut regions = Vec::new();

    while let Some(area) = queue.pop_front() {
        for address in area.store_addresses {
            let id = RegionId(address.id);
            if !visited.insert(id) {
                continue;
            }
            regions.push(Region {
                id,
                name: address.name.trim().to_owned(),
            });
        }
    }

    regions
}
