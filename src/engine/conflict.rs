use chrono::NaiveDate;

use crate::model::*;

use super::EngineError;

/// Reject a candidate range whose end precedes its start. Runs before any
/// storage query.
pub(crate) fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, EngineError> {
    if end < start {
        return Err(EngineError::InvalidRange { start, end });
    }
    Ok(DateRange::new(start, end))
}

pub fn overlaps(a: &DateRange, b: &DateRange) -> bool {
    a.overlaps(b)
}

/// First reservation in `reservations` that overlaps `candidate`.
pub fn first_conflict<'a>(
    reservations: &'a [Reservation],
    candidate: &DateRange,
) -> Option<&'a Reservation> {
    reservations
        .iter()
        .find(|r| overlaps(&r.range(), candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn reservation(id: ReservationId, start: &str, end: Option<&str>) -> Reservation {
        Reservation {
            item_id: "CAM-001".into(),
            reservation_id: id,
            job_name: None,
            start: Some(d(start)),
            end: end.map(d),
        }
    }

    #[test]
    fn end_before_start_is_invalid() {
        let err = validate_range(d("2024-06-10"), d("2024-06-01")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRange { .. }));
    }

    #[test]
    fn single_day_range_is_valid() {
        let range = validate_range(d("2024-06-10"), d("2024-06-10")).unwrap();
        assert_eq!(range, DateRange::single_day(d("2024-06-10")));
    }

    #[test]
    fn finds_first_overlap() {
        let list = vec![
            reservation(1, "2024-05-01", Some("2024-05-03")),
            reservation(2, "2024-06-01", Some("2024-06-10")),
            reservation(3, "2024-06-05", None),
        ];
        let hit = first_conflict(&list, &DateRange::new(d("2024-06-06"), d("2024-06-07")));
        assert_eq!(hit.map(|r| r.reservation_id), Some(2));
    }

    #[test]
    fn open_ended_reservation_blocks_future() {
        let list = vec![reservation(9, "2024-01-01", None)];
        let far = DateRange::new(d("2031-01-01"), d("2031-01-05"));
        assert_eq!(first_conflict(&list, &far).map(|r| r.reservation_id), Some(9));
    }

    #[test]
    fn touching_boundaries_conflict() {
        let list = vec![reservation(4, "2024-06-01", Some("2024-06-10"))];
        assert!(first_conflict(&list, &DateRange::single_day(d("2024-06-10"))).is_some());
        assert!(first_conflict(&list, &DateRange::single_day(d("2024-06-11"))).is_none());
        assert!(first_conflict(&list, &DateRange::single_day(d("2024-05-31"))).is_none());
    }
}
