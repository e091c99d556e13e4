//! Optional bundled `/player/` route (§4.6 "Optional `/player/` branch").
//!
//! A minimal HTML shell wired to `hls.js`, with the current request's
//! source URL interpolated so opening `/player/` previews whatever stream
//! the query/header resolved to.

const TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>streamgate player</title>
<script src="https://cdn.jsdelivr.net/npm/hls.js@1"></script>
</head>
<body>
<video id="video" controls autoplay style="width:100%"></video>
<script>
  const sourceUrl = "__SOURCE_URL__";
  const video = document.getElementById("video");
  const masterUrl = "/index.m3u8?source_url=" + encodeURIComponent(sourceUrl);
  if (Hls.isSupported()) {
    const hls = new Hls();
    hls.loadSource(masterUrl);
    hls.attachMedia(video);
  } else if (video.canPlayType("application/vnd.apple.mpegurl")) {
    video.src = masterUrl;
  }
</script>
</body>
</html>
"#;

pub fn render(source_url: &str) -> String {
    TEMPLATE.replace("__SOURCE_URL__", &source_url.replace('"', "&quot;"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_source_url() {
        let html = render("http://host/a.mp4");
        assert!(html.contains("http://host/a.mp4"));
        assert!(!html.contains("__SOURCE_URL__"));
    }

    #[test]
    fn escapes_quotes_in_source_url() {
        let html = render("http://host/a.mp4\"><script>alert(1)</script>");
        assert!(!html.contains("\"><script>"));
    }
}
