//! Unit tests for the XML codec and response parsing.

use super::*;
use crate::error::ErrorKind;
use rstest::rstest;

const RESERVATIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Response CommandName="GetCurrentReservations" Success="true">
  <ErrorCode>0</ErrorCode>
  <ResponseInfo xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="GetReservationsInfo">
    <Reservations>
      <Reservation Id="r-1" Name="tg regression tests" Owner="admin" Status="Started"/>
      <Reservation Id="r-2" Name="other" Owner="admin" Status="Completed"/>
    </Reservations>
  </ResponseInfo>
</Response>"#;

#[test]
fn request_body_nests_parameters_under_method() {
    let body = RequestBody::new("Logon")
        .text("username", "admin")
        .text("password", "a<b")
        .text("domainName", "Global");

    let xml = body.to_xml().expect("serialise");

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"), "{xml}");
    assert!(
        xml.contains(
            "<Logon><username>admin</username><password>a&lt;b</password><domainName>Global</domainName></Logon>"
        ),
        "{xml}"
    );
}

#[test]
fn request_body_writes_nested_lists() {
    let body = RequestBody::new("SetAttributesValues").list(
        "resourcesAttributesUpdateRequests",
        vec![
            RequestItem::new("ResourceAttributesUpdateRequest")
                .field("ResourceFullName", "Testing/chassis")
                .list(
                    "AttributeNamesValues",
                    vec![RequestItem::new("AttributeNameValue")
                        .field("Name", "User")
                        .field("Value", "root")],
                ),
        ],
    );

    let xml = body.to_xml().expect("serialise");

    assert!(
        xml.contains(
            "<resourcesAttributesUpdateRequests><ResourceAttributesUpdateRequest>\
             <ResourceFullName>Testing/chassis</ResourceFullName><AttributeNamesValues>\
             <AttributeNameValue><Name>User</Name><Value>root</Value></AttributeNameValue>\
             </AttributeNamesValues></ResourceAttributesUpdateRequest>\
             </resourcesAttributesUpdateRequests>"
        ),
        "{xml}"
    );
}

#[test]
fn xml_node_drops_namespace_prefixes() {
    let node = XmlNode::parse(r#"<a:Root xmlns:a="urn:x" a:kind="k"><a:Child>text</a:Child></a:Root>"#)
        .expect("parse");

    assert_eq!(node.name, "Root");
    assert_eq!(node.attr("kind"), Some("k"));
    assert_eq!(node.field("Child"), Some("text"));
}

#[rstest]
#[case("")]
#[case("<open>")]
#[case("<a></b>")]
fn xml_node_rejects_broken_documents(#[case] xml: &str) {
    assert!(XmlNode::parse(xml).is_err());
}

#[test]
fn parse_response_returns_response_info() {
    let info = parse_response("GetCurrentReservations", RESERVATIONS).expect("response");

    let reservations = parse_reservations(&info);

    assert_eq!(reservations.len(), 2);
    let first = reservations.first().expect("first reservation");
    assert_eq!(first.id, "r-1");
    assert_eq!(first.name, "tg regression tests");
    assert_eq!(first.status, "Started");
}

#[test]
fn parse_response_maps_failures_to_api_errors() {
    let body = r#"<Response CommandName="EndReservation" Success="false">
        <ErrorCode>100</ErrorCode><ErrorMessage>Reservation not found</ErrorMessage>
    </Response>"#;

    let err = parse_response("EndReservation", body).expect_err("failure");

    assert_eq!(
        err,
        SessionError::Api {
            method: String::from("EndReservation"),
            code: String::from("100"),
            message: String::from("Reservation not found"),
        }
    );
}

#[test]
fn parse_response_without_payload_yields_empty_node() {
    let info = parse_response("DeleteResource", r#"<Response Success="true"/>"#).expect("response");
    assert_eq!(info, XmlNode::default());
}

#[test]
fn parse_response_rejects_non_xml() {
    let err = parse_response("Logon", "<html").expect_err("malformed");
    assert!(matches!(err, SessionError::MalformedResponse { .. }), "{err:?}");
}

#[rstest]
#[case(r#"<ResponseInfo><Token Token="abc"/></ResponseInfo>"#, "abc")]
#[case(r"<ResponseInfo><Token>xyz</Token></ResponseInfo>", "xyz")]
fn logon_token_is_read_from_attribute_or_text(#[case] xml: &str, #[case] expected: &str) {
    let info = XmlNode::parse(xml).expect("parse");
    assert_eq!(parse_logon_token(&info).expect("token"), expected);
}

#[test]
fn logon_without_token_is_malformed() {
    let info = XmlNode::parse("<ResponseInfo/>").expect("parse");
    assert!(parse_logon_token(&info).is_err());
}

#[test]
fn created_reservation_requires_an_id() {
    let info = XmlNode::parse(r#"<ResponseInfo><Reservation Name="x"/></ResponseInfo>"#)
        .expect("parse");

    let err = parse_created_reservation("CreateImmediateReservation", &info).expect_err("no id");

    assert!(err.to_string().contains("reservation has no id"), "{err}");
}

#[test]
fn reservation_details_collect_services_and_connectors() {
    let info = XmlNode::parse(
        r#"<ResponseInfo>
          <ReservationDescription Id="r-1" Name="demo" Status="Started">
            <Resources><ReservedResourceInfo Name="chassis"/></Resources>
            <Services><ReservationService Alias="check-a"/><ReservationService Alias="check-b"/></Services>
            <Connectors><Connector Source="chassis" Target="check-a" Alias="check-a"/></Connectors>
          </ReservationDescription>
        </ResponseInfo>"#,
    )
    .expect("parse");

    let details = parse_reservation_details(&info).expect("details");

    assert_eq!(details.status, "Started");
    assert_eq!(details.services, ["check-a", "check-b"]);
    assert_eq!(details.resources, ["chassis"]);
    assert_eq!(
        details.connectors,
        [ConnectorInfo {
            source: String::from("chassis"),
            target: String::from("check-a"),
            alias: String::from("check-a"),
        }]
    );
}

#[test]
fn resource_list_prefers_full_address() {
    let info = XmlNode::parse(
        r#"<ResponseInfo><Resources>
            <ResourceInfo Name="chassis" ResourceModelName="Ixia Chassis" Address="1.2.3.4" FullAddress="" FolderFullPath="Testing"/>
            <ResourceInfo Name="port" ResourceModelName="Port" Address="P1" FullAddress="1.2.3.4/P1" FolderFullPath="Testing"/>
        </Resources></ResponseInfo>"#,
    )
    .expect("parse");

    let resources = parse_resource_list(&info);

    let addresses: Vec<&str> = resources.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(addresses, ["1.2.3.4", "1.2.3.4/P1"]);
    assert_eq!(resources.first().map(|r| r.model.as_str()), Some("Ixia Chassis"));
}

#[test]
fn session_errors_become_remote_operation_errors() {
    let err = crate::error::TrafficError::from(SessionError::Api {
        method: String::from("UpdateScript"),
        code: String::from("7"),
        message: String::from("Script not found"),
    });

    assert_eq!(err.kind(), ErrorKind::RemoteOperation);
    assert_eq!(
        err.to_string(),
        "UpdateScript failed: UpdateScript failed with error 7: Script not found"
    );
}
