//! Indiana Professional Licensing Agency, Plumbing Commission licensees.

use crate::record::{NormalizedRecord, RawRecord};
use crate::scrape::DetailPolicy;
use crate::targets::mylicense::MyLicenseSite;

pub static SITE: MyLicenseSite = MyLicenseSite {
    name: "indiana",
    search_url: "https://mylicense.in.gov/everification/Search.aspx",
    profession: Some("Plumbing Commission"),
    license_type: None,
    row_keys: &["Name", "License", "Profession", "Type", "Status", "Address"],
    identity: &["Name", "License", "Profession", "Type", "Status", "Address"],
    page_limit: 670,
    detail_fields: &[
        ("_ctl35__ctl1_issue_date", "Issue"),
        ("_ctl35__ctl1_expiry", "Expiration"),
        ("_ctl35__ctl1_obtained_by", "Method"),
    ],
    detail_policy: DetailPolicy::Abort,
    extra_columns: &[
        "Profession",
        "License Type",
        "Issue Date",
        "Expiration Date",
        "Method",
    ],
    format,
};

fn format(record: &RawRecord, out: &mut NormalizedRecord) {
    out.set("Street Address 1", record.field("Address"));
    out.set("State", "Indiana");
    out.set("Profession", record.field("Profession"));
    out.set("License Type", record.field("Type"));
    out.set("Issue Date", record.field("Issue"));
    out.set("Expiration Date", record.field("Expiration"));
    out.set("Method", record.field("Method"));
}
