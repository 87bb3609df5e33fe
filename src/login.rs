// src/login.rs
//
// Sign-in negotiation. Goodreads delegates authentication to an Amazon
// sign-in form that may interpose a CAPTCHA challenge; solving that puzzle
// and completing interactive logins are injected capabilities so frontends
// decide how a human (or anything else) gets involved.

use std::io::Write as _;
use std::io::{BufRead, stdin, stdout};

use log::{info, warn};
use scraper::{ElementRef, Html};

use crate::config::consts::{POST_LOGIN_URL, SIGNIN_POST_URL, SIGNIN_URL};
use crate::error::EnhanceError;
use crate::metadata::{device_metadata, encrypt_metadata};
use crate::net::Session;
use crate::specs::css;

/// Answers a bot-detection image puzzle during login.
pub trait ChallengeSolver {
    fn solve(&mut self, image: &[u8]) -> Result<String, EnhanceError>;
}

/// Lets a human complete an interactive login; returns when they are done.
pub trait LoginPrompt {
    fn wait_for_login(&mut self) -> Result<(), EnhanceError>;
}

/// An externally controlled browser the interactive flow can drive.
pub trait LoginBrowser {
    fn goto(&mut self, url: &str) -> Result<(), EnhanceError>;
    fn current_url(&mut self) -> Result<String, EnhanceError>;
    /// (name, value) pairs for the site's cookies.
    fn cookies(&mut self) -> Result<Vec<(String, String)>, EnhanceError>;
    fn user_agent(&mut self) -> Result<String, EnhanceError>;
}

/// Default solver: persist the image next to the process and block on a
/// terminal prompt.
pub struct FileCaptchaSolver;

impl ChallengeSolver for FileCaptchaSolver {
    fn solve(&mut self, image: &[u8]) -> Result<String, EnhanceError> {
        std::fs::write("captcha.png", image)?;
        println!("Captcha saved to current directory ('captcha.png').");
        print!("Please enter the characters in the captcha: ");
        stdout().flush()?;
        let mut guess = String::new();
        stdin().lock().read_line(&mut guess)?;
        Ok(guess.trim().to_ascii_lowercase())
    }
}

/// Default prompt: block until the user presses Enter.
pub struct StdinLoginPrompt;

impl LoginPrompt for StdinLoginPrompt {
    fn wait_for_login(&mut self) -> Result<(), EnhanceError> {
        println!("Complete the login in the browser window, then press Enter.");
        let mut line = String::new();
        stdin().lock().read_line(&mut line)?;
        Ok(())
    }
}

pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Credential flow: negotiate the delegated sign-in form, solving challenges
/// as they appear, until the server redirects away from the challenge
/// endpoint. Returns the session whose cookie jar now holds the login.
pub fn login(
    credentials: &Credentials,
    solver: &mut dyn ChallengeSolver,
) -> Result<Session, EnhanceError> {
    let session = Session::new();

    info!("fetching sign-in page");
    let body = fetch_for_login(&session, SIGNIN_URL)?;
    let signin_href = find_email_signin_link(&body).ok_or_else(|| {
        EnhanceError::Auth("no e-mail sign-in link on the sign-in page; did the layout change?".into())
    })?;

    info!("fetching delegated sign-in page {signin_href}");
    let mut page = fetch_for_login(&session, &signin_href)?;

    loop {
        let form = parse_signin_form(&page)?;

        if let Some(message) = &form.error_box {
            warn!("sign-in page reports: {message}");
        }

        let mut fields = form.fields;
        if let Some(src) = &form.captcha_src {
            info!("sign-in page presented a captcha");
            let image = session.fetch_bytes(&absolutize(&signin_href, src))?;
            let guess = solver.solve(&image)?;
            set_field(&mut fields, "guess", guess);
            set_field(&mut fields, "use_image_captcha", "true".into());
            set_field(&mut fields, "use_audio_captcha", "false".into());
            set_field(&mut fields, "showPasswordChecked", "false".into());
        }

        set_field(&mut fields, "email", credentials.email.clone());
        set_field(&mut fields, "password", credentials.password.clone());
        set_field(&mut fields, "create", "0".into());
        set_field(&mut fields, "encryptedPasswordExpected", String::new());
        set_field(
            &mut fields,
            "metadata1",
            encrypt_metadata(&device_metadata(session.user_agent(), &signin_href)?)?,
        );

        let action = absolutize(&signin_href, &form.action);
        info!("submitting sign-in form to {action}");
        let response = session
            .send_form(&form.method, &action, &fields)
            .map_err(|e| EnhanceError::Auth(format!("sign-in submission failed: {e}")))?;

        let final_url = response.get_url().to_string();
        if !final_url.starts_with(SIGNIN_POST_URL) {
            info!("login complete, landed on {final_url}");
            return Ok(session);
        }
        // Still on the challenge endpoint: parse the new page and go again.
        page = response
            .into_string()
            .map_err(|e| EnhanceError::Auth(format!("reading sign-in response: {e}")))?;
    }
}

/// Interactive flow: hand the sign-in page to an external browser, wait for
/// the human, then demand to be on the expected post-login page before
/// cloning the browser's identity into a fresh session.
pub fn login_with_browser(
    browser: &mut dyn LoginBrowser,
    prompt: &mut dyn LoginPrompt,
) -> Result<Session, EnhanceError> {
    browser.goto(SIGNIN_URL)?;
    prompt.wait_for_login()?;

    let here = browser.current_url()?;
    if here != POST_LOGIN_URL {
        return Err(EnhanceError::Auth(format!(
            "browser is at {here}, expected {POST_LOGIN_URL}; login was not completed"
        )));
    }
    let cookies = browser.cookies()?;
    let user_agent = browser.user_agent()?;
    Ok(Session::with_cookies(&user_agent, &cookies))
}

/* ---------------- markup helpers ---------------- */

struct SigninForm {
    method: String,
    action: String,
    fields: Vec<(String, String)>,
    captcha_src: Option<String>,
    error_box: Option<String>,
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// During login every HTTP failure is an auth failure.
fn fetch_for_login(session: &Session, url: &str) -> Result<String, EnhanceError> {
    match session.fetch(url) {
        Ok(body) => Ok(body),
        Err(EnhanceError::Network(msg)) => Err(EnhanceError::Auth(msg)),
        Err(other) => Err(other),
    }
}

fn find_email_signin_link(page: &str) -> Option<String> {
    let doc = Html::parse_document(page);
    doc.select(&css("a[href]"))
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.contains(SIGNIN_POST_URL))
        .map(str::to_string)
}

/// Pull the sign-in form apart: submit target, every input (hidden inputs
/// keep their value, the rest start empty), plus the optional captcha image
/// and error box.
fn parse_signin_form(page: &str) -> Result<SigninForm, EnhanceError> {
    let doc = Html::parse_document(page);

    let form = doc
        .select(&css(r#"form[name="signIn"]"#))
        .next()
        .or_else(|| doc.select(&css("form")).next())
        .ok_or_else(|| {
            EnhanceError::Auth("no sign-in form on the page; did the layout change?".into())
        })?;

    let method = form.value().attr("method").unwrap_or("GET").to_string();
    let action = form
        .value()
        .attr("action")
        .ok_or_else(|| EnhanceError::Auth("sign-in form has no action".into()))?
        .to_string();

    let mut fields = Vec::new();
    for input in form.select(&css("input")) {
        let Some(name) = input.value().attr("name") else {
            continue;
        };
        let value = if input.value().attr("type") == Some("hidden") {
            input.value().attr("value").unwrap_or("")
        } else {
            ""
        };
        fields.push((name.to_string(), value.to_string()));
    }

    let captcha_src = doc
        .select(&css("img[alt]"))
        .find(|img| {
            img.value()
                .attr("alt")
                .is_some_and(|alt| alt.contains("CAPTCHA"))
        })
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    let error_box = doc
        .select(&css("#auth-error-message-box"))
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());

    Ok(SigninForm {
        method,
        action,
        fields,
        captcha_src,
        error_box,
    })
}

/// Overwrite a form field if the page already declared it, add it otherwise.
fn set_field(fields: &mut Vec<(String, String)>, name: &str, value: String) {
    match fields.iter_mut().find(|(n, _)| n == name) {
        Some(field) => field.1 = value,
        None => fields.push((name.to_string(), value)),
    }
}

/// Resolve a possibly relative href against the page it came from.
/// Handles the absolute and root-relative shapes the sign-in pages use.
fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let origin = base
        .split_once("://")
        .and_then(|(scheme, rest)| rest.find('/').map(|i| format!("{scheme}://{}", &rest[..i])))
        .unwrap_or_else(|| base.trim_end_matches('/').to_string());
    if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM_PAGE: &str = r#"
        <html><body>
          <div id="auth-error-message-box"><p>There was a problem</p></div>
          <form name="signIn" method="post" action="/ap/signin">
            <input type="hidden" name="appActionToken" value="tok123">
            <input type="hidden" name="workflowState" value="ws456">
            <input type="email" name="email" value="should-not-carry">
            <input type="password" name="password">
          </form>
          <img src="/captcha/image.jpg" alt="Visual CAPTCHA image, continue down for an audio option.">
        </body></html>
    "#;

    #[test]
    fn form_fields_keep_hidden_values_only() {
        let form = parse_signin_form(FORM_PAGE).unwrap();
        assert_eq!(form.method, "post");
        assert_eq!(form.action, "/ap/signin");
        assert!(form.fields.contains(&("appActionToken".into(), "tok123".into())));
        assert!(form.fields.contains(&("workflowState".into(), "ws456".into())));
        assert!(form.fields.contains(&("email".into(), String::new())));
        assert!(form.fields.contains(&("password".into(), String::new())));
    }

    #[test]
    fn captcha_and_error_box_are_detected() {
        let form = parse_signin_form(FORM_PAGE).unwrap();
        assert_eq!(form.captcha_src.as_deref(), Some("/captcha/image.jpg"));
        assert_eq!(form.error_box.as_deref(), Some("There was a problem"));
    }

    #[test]
    fn page_without_any_form_is_an_auth_error() {
        let result = parse_signin_form("<html><body>nothing here</body></html>");
        assert!(matches!(result, Err(EnhanceError::Auth(_))));
    }

    #[test]
    fn email_signin_link_is_found_by_href() {
        let page = format!(
            r#"<a href="/user/sign_up">join</a><a href="{SIGNIN_POST_URL}?x=1">email login</a>"#
        );
        assert_eq!(
            find_email_signin_link(&page).as_deref(),
            Some(&format!("{SIGNIN_POST_URL}?x=1")[..])
        );
    }

    #[test]
    fn absolutize_shapes() {
        let base = "https://www.goodreads.com/ap/signin?openid=x";
        assert_eq!(absolutize(base, "https://a/b"), "https://a/b");
        assert_eq!(
            absolutize(base, "/ap/verify"),
            "https://www.goodreads.com/ap/verify"
        );
    }

    struct FakeBrowser {
        url: String,
    }
    impl LoginBrowser for FakeBrowser {
        fn goto(&mut self, _url: &str) -> Result<(), EnhanceError> {
            Ok(())
        }
        fn current_url(&mut self) -> Result<String, EnhanceError> {
            Ok(self.url.clone())
        }
        fn cookies(&mut self) -> Result<Vec<(String, String)>, EnhanceError> {
            Ok(vec![("sess".into(), "abc".into())])
        }
        fn user_agent(&mut self) -> Result<String, EnhanceError> {
            Ok("fake-browser/1".into())
        }
    }

    struct NoPrompt;
    impl LoginPrompt for NoPrompt {
        fn wait_for_login(&mut self) -> Result<(), EnhanceError> {
            Ok(())
        }
    }

    #[test]
    fn browser_flow_requires_the_post_login_url() {
        let mut stuck = FakeBrowser { url: format!("{SIGNIN_POST_URL}?step=2") };
        let err = login_with_browser(&mut stuck, &mut NoPrompt);
        assert!(matches!(err, Err(EnhanceError::Auth(_))));

        let mut done = FakeBrowser { url: POST_LOGIN_URL.to_string() };
        let session = login_with_browser(&mut done, &mut NoPrompt).unwrap();
        assert_eq!(session.user_agent(), "fake-browser/1");
    }
}
