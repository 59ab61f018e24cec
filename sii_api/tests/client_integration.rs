use sii_api::types::{Credentials, Rut};
use sii_api::{AuthError, Client, Endpoints};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> Credentials {
    let rut: Rut = "12.345.678-9".parse().unwrap();
    Credentials::new(rut, "clave-secreta").unwrap()
}

fn client_for(server: &MockServer) -> Client {
    Client::with_endpoints(credentials(), Endpoints::with_base_url(&server.uri())).unwrap()
}

async fn mount_login(server: &MockServer) {
    let redirect = format!(
        "<html><script>location.replace(\"{}/cgi_misii/siihome.cgi\");</script></html>",
        server.uri()
    );
    Mock::given(method("POST"))
        .and(path("/cgi_AUT2000/CAutInicio.cgi"))
        .and(body_string_contains("rut=12345678"))
        .and(body_string_contains("rutcntr=12.345.678-9"))
        .and(body_string_contains("clave=clave-secreta"))
        .respond_with(ResponseTemplate::new(200).set_body_string(redirect))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi_misii/siihome.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Mi SII</title>"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_follows_js_redirect_to_home() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/AUT2000/InicioAutenticacion/IngresoRutClave.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server).await;

    let client = client_for(&server);
    assert!(!client.is_authenticated());
    client.login().await.unwrap();
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn referer_failure_is_not_fatal() {
    let server = MockServer::start().await;
    // No referer mock: wiremock answers 404 and the handshake carries on.
    mount_login(&server).await;

    let client = client_for(&server);
    assert!(client.login().await.is_ok());
}

#[tokio::test]
async fn login_without_redirect_falls_back_to_home() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi_AUT2000/CAutInicio.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi_misii/siihome.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Servicios online"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login().await.unwrap();
}

#[tokio::test]
async fn login_rejected_status_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi_AUT2000/CAutInicio.cgi"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.login().await.unwrap_err();
    assert!(matches!(err, AuthError::LoginFailed { status: 500 }));
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn unexpected_landing_page_is_fatal() {
    let server = MockServer::start().await;
    let redirect = format!(
        "<script>location.replace('{}/cgi_AUT2000/error.cgi')</script>",
        server.uri()
    );
    Mock::given(method("POST"))
        .and(path("/cgi_AUT2000/CAutInicio.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(redirect))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi_AUT2000/error.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Clave incorrecta</h1>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.login().await {
        Err(AuthError::UnexpectedHome { url, snippet }) => {
            assert!(url.ends_with("/cgi_AUT2000/error.cgi"));
            assert!(snippet.contains("Clave incorrecta"));
        }
        other => panic!("expected UnexpectedHome, got {:?}", other),
    }
}

#[tokio::test]
async fn home_error_status_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi_AUT2000/CAutInicio.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi_misii/siihome.cgi"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.login().await.unwrap_err();
    assert!(matches!(err, AuthError::HomeStatus { status: 503 }));
}

#[tokio::test]
async fn reports_require_login() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    assert!(matches!(
        client.annual_report_html(2025).await,
        Err(AuthError::NotAuthenticated(_))
    ));
    assert!(matches!(
        client.download_invoice_pdf("X").await,
        Err(AuthError::NotAuthenticated(_))
    ));
}

#[tokio::test]
async fn annual_report_is_decoded_as_latin1() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/cgi_IMT/TMBCOC_InformeAnualBhe.cgi"))
        .and(query_param("rut_arrastre", "12345678"))
        .and(query_param("dv_arrastre", "9"))
        .and(query_param("cbanoinformeanual", "2025"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"<title>Boletas Electr\xf3nicas</title>".to_vec())
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login().await.unwrap();
    let html = client.annual_report_html(2025).await.unwrap();
    assert_eq!(html, "<title>Boletas Electrónicas</title>");
}

#[tokio::test]
async fn monthly_report_sends_padded_month() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/cgi_IMT/TMBCOC_InformeMensualBhe.cgi"))
        .and(query_param("cbanoinformemensual", "2025"))
        .and(query_param("cbmesinformemensual", "01"))
        .and(query_param("pagina_solicitada", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>mensual</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login().await.unwrap();
    let html = client.monthly_report_html(2025, 1).await.unwrap();
    assert_eq!(html, "<html>mensual</html>");
}

#[tokio::test]
async fn report_server_error_is_surfaced() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/cgi_IMT/TMBCOC_InformeAnualBhe.cgi"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login().await.unwrap();
    let err = client.annual_report_html(2025).await.unwrap_err();
    assert!(matches!(err, AuthError::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn pdf_download_checks_content_type() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/cgi_IMT/TMBCOT_ConsultaBoletaPdf.cgi"))
        .and(query_param("txt_codigobarras", "12345678AAAAAAAAABB"))
        .and(query_param("origen", "PROPIOS"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"%PDF-1.4 fake".to_vec())
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi_IMT/TMBCOT_ConsultaBoletaPdf.cgi"))
        .and(query_param("txt_codigobarras", "EXPIRED"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>login</html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login().await.unwrap();

    let bytes = client
        .download_invoice_pdf("12345678AAAAAAAAABB")
        .await
        .unwrap();
    assert_eq!(bytes, b"%PDF-1.4 fake");

    let err = client.download_invoice_pdf("EXPIRED").await.unwrap_err();
    assert!(matches!(err, AuthError::NotPdf));
}

#[tokio::test]
async fn initial_cookies_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi_AUT2000/CAutInicio.cgi"))
        .and(header("cookie", "TOKEN=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi_misii/siihome.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Mi SII"))
        .mount(&server)
        .await;

    let creds = credentials().with_initial_cookie("TOKEN", "abc");
    let client = Client::with_endpoints(creds, Endpoints::with_base_url(&server.uri())).unwrap();
    client.login().await.unwrap();
}
