//! Embedded HTML pages: the cluster picker and the per-cluster
//! commandline instructions. Plain string templates, no template engine.

use std::fmt::Write;

use crate::kubeconfig::UserInfo;

const PAGE_STYLE: &str = "\
body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
pre { background: #f4f4f4; padding: 1rem; overflow-x: auto; }
table { border-collapse: collapse; } td, th { border: 1px solid #ccc; padding: 0.3rem 0.6rem; }";

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{PAGE_STYLE}</style>\n</head>\n\
         <body>\n{body}\n</body>\n</html>\n",
        title = escape(title),
    )
}

/// Landing page: one login link per configured cluster.
pub fn render_home(root_path: &str, clusters: &[&str]) -> String {
    let mut body = String::from("<h1>Kubernetes Cluster Login</h1>\n<ul>\n");
    for name in clusters {
        let _ = writeln!(
            body,
            "<li><a href=\"{root}/login?cluster={q}\">{n}</a></li>",
            root = root_path,
            q = urlencoding::encode(name),
            n = escape(name),
        );
    }
    body.push_str("</ul>");
    page("Kubegate", &body)
}

/// Post-login page: kubeconfig download plus copy/paste kubectl setup,
/// and the claim table when the cluster opts in.
pub fn render_commandline(root_path: &str, info: &UserInfo) -> String {
    let cluster = escape(&info.cluster_name);
    let query = urlencoding::encode(&info.cluster_name);
    let mut body = format!(
        "<h1>Cluster: {cluster}</h1>\n\
         <p>Signed in as <strong>{user}</strong>.</p>\n\
         <p><a href=\"{root}/kubeconf?cluster={query}\">Download kubeconfig</a>\n\
         or configure kubectl manually:</p>\n",
        user = escape(&info.kube_cfg_user),
        root = root_path,
    );

    let mut commands = format!(
        "kubectl config set-cluster {cluster} --server={server}\n\
         kubectl config set-credentials {user} \\\n\
    --auth-provider=oidc \\\n\
    --auth-provider-arg=idp-issuer-url={issuer} \\\n\
    --auth-provider-arg=client-id={client_id} \\\n\
    --auth-provider-arg=client-secret={client_secret} \\\n\
    --auth-provider-arg=id-token={id_token}",
        cluster = info.cluster_name,
        server = info.api_server_url,
        user = info.kube_cfg_user,
        issuer = info.issuer_url,
        client_id = info.client_id,
        client_secret = info.client_secret,
        id_token = info.id_token,
    );
    if let Some(token) = &info.refresh_token {
        let _ = write!(commands, " \\\n    --auth-provider-arg=refresh-token={token}");
    }
    let _ = write!(
        commands,
        "\nkubectl config set-context {cluster} --cluster={cluster} --user={user}\n\
         kubectl config use-context {cluster}",
        cluster = info.cluster_name,
        user = info.kube_cfg_user,
    );
    let _ = write!(body, "<pre>{}</pre>\n", escape(&commands));

    if info.show_claims {
        body.push_str("<h2>ID Token Claims</h2>\n<table>\n<tr><th>Claim</th><th>Value</th></tr>\n");
        for (name, value) in info.claims.iter() {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td></tr>",
                escape(name),
                escape(&value.to_string()),
            );
        }
        body.push_str("</table>\n");
    }

    let _ = write!(
        body,
        "<p><a href=\"{root_path}/logout\">Sign out</a></p>"
    );
    page(&format!("Kubegate - {}", info.cluster_name), &body)
}
