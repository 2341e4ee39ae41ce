use docmark_babel::formats::docx::package::{Package, DOCUMENT};
use docmark_babel::{Environment, FormatError, FormatRegistry, SerializedDocument};

#[test]
fn markdown_converts_to_a_package() {
    let registry = FormatRegistry::default();
    let conversion = registry
        .convert(b"# Hello\n", "markdown", &mut Environment::default())
        .unwrap();
    let SerializedDocument::Binary(bytes) = conversion.output else {
        panic!("expected a binary package");
    };
    let package = Package::read(&bytes).unwrap();
    assert!(package.contains(DOCUMENT));
}

#[test]
fn docx_converts_back_to_text() {
    let registry = FormatRegistry::default();
    let mut env = Environment::default();
    let bytes = registry
        .convert(b"Some *words*.\n", "markdown", &mut env)
        .unwrap()
        .output
        .into_bytes();
    let conversion = registry.convert(&bytes, "docx", &mut env).unwrap();
    assert_eq!(
        conversion.output,
        SerializedDocument::Text("Some *words*.\n".to_string())
    );
}

#[test]
fn invalid_utf8_is_a_parse_error() {
    let registry = FormatRegistry::default();
    let err = registry
        .convert(&[0xff, 0xfe, b'a'], "markdown", &mut Environment::default())
        .unwrap_err();
    assert!(matches!(err, FormatError::ParseError(_)));
}

#[test]
fn unknown_format_is_reported() {
    let registry = FormatRegistry::default();
    let err = registry
        .convert(b"", "odt", &mut Environment::default())
        .unwrap_err();
    assert_eq!(err, FormatError::FormatNotFound("odt".to_string()));
}
