use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

/// 上流APIから取得する勤怠の1レコード。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub employee_name: String,
    pub time_in: DateTime<Utc>,
    pub time_out: DateTime<Utc>,
}

impl TimeEntry {
    /// 勤務時間を時間単位で返す。
    ///
    /// `time_out`が`time_in`より前の場合は負の値になる。
    pub fn duration_hours(&self) -> f64 {
        let duration = self.time_out - self.time_in;
        duration.num_milliseconds() as f64 / 3_600_000.0
    }
}

/// レスポンスのキー。大文字小文字は区別しない。
enum Field {
    EmployeeName,
    TimeIn,
    TimeOut,
    Ignored,
}

impl Field {
    fn from_key(key: &str) -> Self {
        if key.eq_ignore_ascii_case("EmployeeName") {
            Field::EmployeeName
        } else if key.eq_ignore_ascii_case("TimeIn") {
            Field::TimeIn
        } else if key.eq_ignore_ascii_case("TimeOut") {
            Field::TimeOut
        } else {
            Field::Ignored
        }
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldVisitor;

        impl<'de> Visitor<'de> for FieldVisitor {
            type Value = Field;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a time entry field name")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Field, E> {
                Ok(Field::from_key(value))
            }
        }

        deserializer.deserialize_identifier(FieldVisitor)
    }
}

impl<'de> Deserialize<'de> for TimeEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimeEntryVisitor;

        impl<'de> Visitor<'de> for TimeEntryVisitor {
            type Value = TimeEntry;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a time entry object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TimeEntry, A::Error> {
                let mut employee_name: Option<Option<String>> = None;
                let mut time_in: Option<String> = None;
                let mut time_out: Option<String> = None;

                while let Some(key) = map.next_key::<Field>()? {
                    match key {
                        Field::EmployeeName => {
                            if employee_name.is_some() {
                                return Err(de::Error::duplicate_field("EmployeeName"));
                            }
                            employee_name = Some(map.next_value()?);
                        }
                        Field::TimeIn => {
                            if time_in.is_some() {
                                return Err(de::Error::duplicate_field("TimeIn"));
                            }
                            time_in = Some(map.next_value()?);
                        }
                        Field::TimeOut => {
                            if time_out.is_some() {
                                return Err(de::Error::duplicate_field("TimeOut"));
                            }
                            time_out = Some(map.next_value()?);
                        }
                        Field::Ignored => {
                            map.next_value::<de::IgnoredAny>()?;
                        }
                    }
                }

                let time_in = time_in.ok_or_else(|| de::Error::missing_field("TimeIn"))?;
                let time_out = time_out.ok_or_else(|| de::Error::missing_field("TimeOut"))?;

                Ok(TimeEntry {
                    employee_name: employee_name.flatten().unwrap_or_default(),
                    time_in: parse_timestamp(&time_in).map_err(de::Error::custom)?,
                    time_out: parse_timestamp(&time_out).map_err(de::Error::custom)?,
                })
            }
        }

        deserializer.deserialize_map(TimeEntryVisitor)
    }
}

/// タイムスタンプをパースする。
///
/// オフセット付きのRFC 3339と、オフセットなしのISO-8601を受け付ける。
/// オフセットなしの場合はUTCとして扱う。
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.to_utc());
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("invalid timestamp {:?}: {}", s, err))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    use super::TimeEntry;

    /// キーの大文字小文字を区別せずにデシリアライズできることを確認する。
    #[rstest]
    #[case::pascal(r#"{"EmployeeName":"Alice","TimeIn":"2022-02-22T09:00:00","TimeOut":"2022-02-22T17:00:00"}"#)]
    #[case::lower(r#"{"employeename":"Alice","timein":"2022-02-22T09:00:00","timeout":"2022-02-22T17:00:00"}"#)]
    #[case::upper(r#"{"EMPLOYEENAME":"Alice","TIMEIN":"2022-02-22T09:00:00","TIMEOUT":"2022-02-22T17:00:00"}"#)]
    #[case::with_offset(r#"{"EmployeeName":"Alice","TimeIn":"2022-02-22T10:00:00+01:00","TimeOut":"2022-02-22T17:00:00Z"}"#)]
    #[case::with_fraction(r#"{"EmployeeName":"Alice","TimeIn":"2022-02-22T09:00:00.000","TimeOut":"2022-02-22T17:00:00.000"}"#)]
    #[case::extra_fields(r#"{"Id":"x","EmployeeName":"Alice","TimeIn":"2022-02-22T09:00:00","TimeOut":"2022-02-22T17:00:00","EntryNotes":"n"}"#)]
    fn test_deserialize(#[case] input: &str) {
        let entry: TimeEntry = serde_json::from_str(input).unwrap();

        assert_eq!(
            entry,
            TimeEntry {
                employee_name: "Alice".to_string(),
                time_in: Utc.with_ymd_and_hms(2022, 2, 22, 9, 0, 0).unwrap(),
                time_out: Utc.with_ymd_and_hms(2022, 2, 22, 17, 0, 0).unwrap(),
            }
        );
        assert_eq!(entry.duration_hours(), 8.0);
    }

    /// 名前がnullまたは存在しない場合は空文字列になることを確認する。
    #[rstest]
    #[case::null(r#"{"EmployeeName":null,"TimeIn":"2022-02-22T09:00:00","TimeOut":"2022-02-22T09:30:00"}"#)]
    #[case::missing(r#"{"TimeIn":"2022-02-22T09:00:00","TimeOut":"2022-02-22T09:30:00"}"#)]
    fn test_deserialize_without_name(#[case] input: &str) {
        let entry: TimeEntry = serde_json::from_str(input).unwrap();

        assert_eq!(entry.employee_name, "");
        assert_eq!(entry.duration_hours(), 0.5);
    }

    /// 異常系のテスト。
    #[rstest]
    #[case::missing_time_in(r#"{"EmployeeName":"Alice","TimeOut":"2022-02-22T17:00:00"}"#)]
    #[case::missing_time_out(r#"{"EmployeeName":"Alice","TimeIn":"2022-02-22T09:00:00"}"#)]
    #[case::invalid_timestamp(r#"{"EmployeeName":"Alice","TimeIn":"yesterday","TimeOut":"2022-02-22T17:00:00"}"#)]
    #[case::duplicate_key(r#"{"EmployeeName":"Alice","employeeName":"Bob","TimeIn":"2022-02-22T09:00:00","TimeOut":"2022-02-22T17:00:00"}"#)]
    #[case::not_object(r#"["Alice"]"#)]
    fn test_deserialize_error(#[case] input: &str) {
        assert!(serde_json::from_str::<TimeEntry>(input).is_err());
    }

    /// 退勤が出勤より前の場合は負の時間になることを確認する。
    #[test]
    fn test_duration_hours_negative() {
        let entry = TimeEntry {
            employee_name: "Alice".to_string(),
            time_in: Utc.with_ymd_and_hms(2022, 2, 22, 12, 0, 0).unwrap(),
            time_out: Utc.with_ymd_and_hms(2022, 2, 22, 9, 0, 0).unwrap(),
        };

        assert_eq!(entry.duration_hours(), -3.0);
    }
}
