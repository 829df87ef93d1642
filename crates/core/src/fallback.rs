//! Offline page served when a navigation can be answered neither from the
//! store nor from the network.

use crate::exchange::Response;

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline - Travel Planner</title>
<style>
  body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
         font-family: system-ui, -apple-system, "Segoe UI", sans-serif; background: #f4f7fb; color: #1f2d3d; }
  main { max-width: 28rem; padding: 2rem; text-align: center; background: #fff; border-radius: 12px;
         box-shadow: 0 4px 16px rgba(31, 45, 61, 0.12); }
  h1 { font-size: 1.5rem; margin: 0 0 0.75rem; }
  p { line-height: 1.5; margin: 0 0 1rem; }
  button { padding: 0.6rem 1.4rem; border: 0; border-radius: 6px; background: #2f6fde; color: #fff; font-size: 1rem; }
</style>
</head>
<body>
<main>
  <h1>You're offline</h1>
  <p>Your itinerary can't be loaded right now. Check your connection and try again.</p>
  <p>Pages you've already opened are still available.</p>
  <button onclick="location.reload()">Retry</button>
</main>
</body>
</html>
"#;

/// The self-contained offline document. Touches neither store nor network.
pub fn offline_page() -> Response {
    Response::html(OFFLINE_PAGE)
}
