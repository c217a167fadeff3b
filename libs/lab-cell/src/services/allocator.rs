use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::models::{AllocatedTest, Allocation, AllocationMode, Lab, LabError, LabTestMapping};

/// Requested tests in first-seen order without repeats.
pub fn unique_tests(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

fn item(lab: &Lab, mapping: &LabTestMapping) -> AllocatedTest {
    AllocatedTest {
        test_id: mapping.test_id,
        lab_id: lab.id,
        lab_name: lab.name.clone(),
        price: mapping.price,
        turnaround_hours: mapping.turnaround_hours,
    }
}

/// Cheaper wins, then the lower lab id.
fn cheaper(candidate: &LabTestMapping, current: &LabTestMapping) -> bool {
    candidate
        .price
        .total_cmp(&current.price)
        .then(candidate.lab_id.cmp(&current.lab_id))
        .is_lt()
}

/// Assign every test to a lab that serves the pincode.
///
/// `labs` are the labs serving the delivery pincode and `mappings` their test
/// offerings. One lab covering every test is preferred (lowest total, then
/// lowest lab id). Otherwise each test goes to its cheapest offering.
pub fn allocate(test_ids: &[Uuid], labs: &[Lab], mappings: &[LabTestMapping]) -> Result<Allocation, LabError> {
    let tests = unique_tests(test_ids);
    let labs_by_id: BTreeMap<Uuid, &Lab> = labs.iter().filter(|l| l.is_active).map(|l| (l.id, l)).collect();

    // best offering per (lab, test)
    let mut offers: HashMap<(Uuid, Uuid), &LabTestMapping> = HashMap::new();
    for mapping in mappings {
        if !mapping.is_available || !labs_by_id.contains_key(&mapping.lab_id) || !tests.contains(&mapping.test_id) {
            continue;
        }
        let key = (mapping.lab_id, mapping.test_id);
        match offers.get(&key) {
            Some(current) if !cheaper(mapping, current) => {}
            _ => {
                offers.insert(key, mapping);
            }
        }
    }

    let mut single: Option<(f64, Uuid)> = None;
    for lab_id in labs_by_id.keys() {
        let covered: Option<Vec<&LabTestMapping>> = tests.iter().map(|t| offers.get(&(*lab_id, *t)).copied()).collect();
        if let Some(covered) = covered {
            let total: f64 = covered.iter().map(|m| m.price).sum();
            // ids iterate ascending, so a tie keeps the earlier lab
            if single.map_or(true, |(best, _)| total < best) {
                single = Some((total, *lab_id));
            }
        }
    }

    if let Some((total_price, lab_id)) = single {
        let lab = labs_by_id[&lab_id];
        let items = tests.iter().map(|t| item(lab, offers[&(lab_id, *t)])).collect();
        return Ok(Allocation {
            mode: AllocationMode::SingleLab,
            total_price,
            items,
        });
    }

    let mut items = Vec::with_capacity(tests.len());
    let mut missing = Vec::new();
    for test_id in &tests {
        let best = offers
            .values()
            .filter(|m| m.test_id == *test_id)
            .fold(None::<&LabTestMapping>, |best, m| match best {
                Some(b) if !cheaper(m, b) => Some(b),
                _ => Some(m),
            });
        match best {
            Some(mapping) => items.push(item(labs_by_id[&mapping.lab_id], mapping)),
            None => missing.push(*test_id),
        }
    }

    if !missing.is_empty() {
        return Err(LabError::TestsNotOffered(missing));
    }

    Ok(Allocation {
        mode: AllocationMode::MultiLab,
        total_price: items.iter().map(|i| i.price).sum(),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn lab(n: u128, name: &str) -> Lab {
        Lab {
            id: Uuid::from_u128(n),
            name: name.to_string(),
            address: "12 MG Road".to_string(),
            phone: "+918012345678".to_string(),
            serviceable_pincodes: vec!["560001".to_string()],
            is_active: true,
        }
    }

    fn offer(lab: u128, test: u128, price: f64) -> LabTestMapping {
        LabTestMapping {
            id: Uuid::new_v4(),
            lab_id: Uuid::from_u128(lab),
            test_id: Uuid::from_u128(test),
            price,
            turnaround_hours: 24,
            is_available: true,
        }
    }

    const CBC: u128 = 100;
    const LIPID: u128 = 200;
    const TSH: u128 = 300;

    #[test]
    fn one_lab_covering_everything_wins_even_if_dearer_per_test() {
        let labs = vec![lab(1, "Alpha"), lab(2, "Beta")];
        let mappings = vec![
            offer(1, CBC, 300.0),
            offer(1, LIPID, 700.0),
            offer(2, CBC, 250.0),
        ];

        let allocation = allocate(&[Uuid::from_u128(CBC), Uuid::from_u128(LIPID)], &labs, &mappings).unwrap();

        assert_eq!(allocation.mode, AllocationMode::SingleLab);
        assert_eq!(allocation.total_price, 1000.0);
        assert!(allocation.items.iter().all(|i| i.lab_name == "Alpha"));
    }

    #[test]
    fn cheapest_complete_lab_is_chosen_and_ties_go_to_lower_id() {
        let labs = vec![lab(3, "Gamma"), lab(2, "Beta"), lab(1, "Alpha")];
        let mappings = vec![
            offer(3, CBC, 200.0),
            offer(2, CBC, 200.0),
            offer(1, CBC, 450.0),
        ];

        let allocation = allocate(&[Uuid::from_u128(CBC)], &labs, &mappings).unwrap();

        assert_eq!(allocation.items[0].lab_id, Uuid::from_u128(2));
        assert_eq!(allocation.total_price, 200.0);
    }

    #[test]
    fn split_across_labs_takes_cheapest_per_test() {
        let labs = vec![lab(1, "Alpha"), lab(2, "Beta")];
        let mappings = vec![
            offer(1, CBC, 300.0),
            offer(1, LIPID, 650.0),
            offer(2, LIPID, 600.0),
            offer(2, TSH, 400.0),
        ];
        let tests = [Uuid::from_u128(CBC), Uuid::from_u128(LIPID), Uuid::from_u128(TSH)];

        let allocation = allocate(&tests, &labs, &mappings).unwrap();

        assert_eq!(allocation.mode, AllocationMode::MultiLab);
        let labs_chosen: Vec<u128> = allocation.items.iter().map(|i| i.lab_id.as_u128()).collect();
        assert_eq!(labs_chosen, vec![1, 2, 2]);
        assert_eq!(allocation.total_price, 1300.0);
    }

    #[test]
    fn duplicate_tests_are_booked_once() {
        let labs = vec![lab(1, "Alpha")];
        let mappings = vec![offer(1, CBC, 300.0)];
        let cbc = Uuid::from_u128(CBC);

        let allocation = allocate(&[cbc, cbc, cbc], &labs, &mappings).unwrap();

        assert_eq!(allocation.items.len(), 1);
        assert_eq!(allocation.total_price, 300.0);
    }

    #[test]
    fn unavailable_or_unserved_offers_are_ignored() {
        let labs = vec![lab(1, "Alpha")];
        let mut withdrawn = offer(1, CBC, 100.0);
        withdrawn.is_available = false;
        let elsewhere = offer(9, CBC, 50.0);

        let result = allocate(&[Uuid::from_u128(CBC)], &labs, &[withdrawn, elsewhere]);

        assert_matches!(result, Err(LabError::TestsNotOffered(ids)) if ids == vec![Uuid::from_u128(CBC)]);
    }

    #[test]
    fn missing_tests_are_all_named() {
        let labs = vec![lab(1, "Alpha")];
        let mappings = vec![offer(1, CBC, 300.0)];
        let tests = [Uuid::from_u128(CBC), Uuid::from_u128(LIPID), Uuid::from_u128(TSH)];

        let err = allocate(&tests, &labs, &mappings).unwrap_err();

        let message = err.to_string();
        assert!(message.contains(&Uuid::from_u128(LIPID).to_string()));
        assert!(message.contains(&Uuid::from_u128(TSH).to_string()));
        assert!(!message.contains(&Uuid::from_u128(CBC).to_string()));
    }
}
