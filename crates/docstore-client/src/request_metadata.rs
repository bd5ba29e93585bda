use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName};

use crate::service::identifier::{InvalidPartitionKeyRangeIdentity, PartitionKeyRangeIdentity};

pub const X_MS_DATE_HEADER_NAME: HeaderName = HeaderName::from_static("x-ms-date");
pub const X_MS_VERSION_HEADER_NAME: HeaderName = HeaderName::from_static("x-ms-version");
pub const X_MS_SUBSTATUS_HEADER_NAME: HeaderName = HeaderName::from_static("x-ms-substatus");
pub const PARTITION_KEY_RANGE_ID_HEADER_NAME: HeaderName =
    HeaderName::from_static("x-ms-documentdb-partitionkeyrangeid");

/// Formats `time` as an RFC 1123 date, e.g. `Tue, 01 Nov 1994 08:12:31 GMT`.
#[must_use]
pub fn rfc1123_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Reads the sub-status header of a gateway response.
#[must_use]
pub fn sub_status(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(X_MS_SUBSTATUS_HEADER_NAME)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Reads the partition key range a request is pinned to.
///
/// # Errors
/// Fails if the header is present but malformed.
pub fn partition_key_range_identity(
    headers: &HeaderMap,
) -> Result<Option<PartitionKeyRangeIdentity>, InvalidPartitionKeyRangeIdentity> {
    let Some(value) = headers.get(PARTITION_KEY_RANGE_ID_HEADER_NAME) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| {
        InvalidPartitionKeyRangeIdentity::new(String::from_utf8_lossy(value.as_bytes()))
    })?;
    value.parse().map(Some)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use http::HeaderValue;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::service::identifier::CollectionRid;

    #[test]
    fn test_rfc1123_date() {
        let time = Utc.with_ymd_and_hms(1994, 11, 1, 8, 12, 31).unwrap();
        assert_eq!(rfc1123_date(time), "Tue, 01 Nov 1994 08:12:31 GMT");
    }

    #[test]
    fn test_sub_status() {
        let mut headers = HeaderMap::new();
        assert_eq!(sub_status(&headers), None);
        headers.insert(X_MS_SUBSTATUS_HEADER_NAME, HeaderValue::from_static("1002"));
        assert_eq!(sub_status(&headers), Some(1002));
        headers.insert(X_MS_SUBSTATUS_HEADER_NAME, HeaderValue::from_static("n/a"));
        assert_eq!(sub_status(&headers), None);
    }

    #[test]
    fn test_partition_key_range_identity_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(partition_key_range_identity(&headers), Ok(None));

        headers.insert(
            PARTITION_KEY_RANGE_ID_HEADER_NAME,
            HeaderValue::from_static("PaYSAPH7qAo=,12"),
        );
        assert_eq!(
            partition_key_range_identity(&headers),
            Ok(Some(PartitionKeyRangeIdentity::new(
                Some(CollectionRid::new("PaYSAPH7qAo=")),
                "12"
            )))
        );

        headers.insert(
            PARTITION_KEY_RANGE_ID_HEADER_NAME,
            HeaderValue::from_static("a,b,c"),
        );
        assert!(partition_key_range_identity(&headers).is_err());
    }
}
