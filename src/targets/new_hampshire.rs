//! New Hampshire Office of Professional Licensure, master plumbers.

use crate::record::{NormalizedRecord, RawRecord};
use crate::scrape::DetailPolicy;
use crate::targets::mylicense::MyLicenseSite;

pub static SITE: MyLicenseSite = MyLicenseSite {
    name: "new-hampshire",
    search_url: "https://nhlicenses.nh.gov/verification/Search.aspx",
    profession: None,
    license_type: Some("Master Plumber"),
    row_keys: &["Name", "Profession", "Type", "License", "Status"],
    identity: &["Name", "Profession", "Type", "License", "Status"],
    page_limit: 74,
    detail_fields: &[
        ("_ctl37__ctl1_issue_date", "Issue"),
        ("_ctl37__ctl1_expiration_date", "Expiration"),
    ],
    // The detail pages time out often; the list row alone is still useful.
    detail_policy: DetailPolicy::KeepPartial,
    extra_columns: &["Full Name", "License Type", "Issue Date", "Expiration Date"],
    format,
};

fn format(record: &RawRecord, out: &mut NormalizedRecord) {
    out.set("State", "New Hampshire");
    out.set("Full Name", record.field("Name"));
    out.set("License Type", record.field("Type"));
    out.set("Issue Date", record.field("Issue"));
    out.set("Expiration Date", record.field("Expiration"));
}

#[cfg(test)]
mod tests {
    use crate::scrape::Target;
    use crate::targets::mylicense::MyLicense;

    use super::*;

    #[test]
    fn partial_record_formats() {
        let target = MyLicense::new(&SITE);
        let record = RawRecord::zip(
            SITE.row_keys,
            ["LeBlanc III, Paul", "Plumbers", "Master Plumber", "MP-4410", "Active"],
        );
        let out = target.format_record(&record);
        assert_eq!(out.get("Last Name"), Some("LeBlanc"));
        assert_eq!(out.get("First Name"), Some("Paul"));
        assert_eq!(out.get("License Number"), Some("MP-4410"));
        assert_eq!(out.get("Full Name"), Some("LeBlanc III, Paul"));
        assert_eq!(out.get("Issue Date"), Some(""));
        assert_eq!(target.detail_policy(), DetailPolicy::KeepPartial);
    }
}
