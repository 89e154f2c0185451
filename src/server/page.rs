/// Single-page UI. It creates a session on load and drives the JSON API; every
/// control is disabled while a request is in flight.
pub const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Image Captioning &amp; Q&amp;A</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; }
  #preview { max-width: 100%; margin-top: 1rem; display: none; }
  .notice { padding: .75rem 1rem; border-radius: 6px; margin: 1rem 0; }
  .info { background: #eef4ff; }
  .error { background: #fdecea; color: #8a1c12; }
  .answer { background: #e9f7ef; white-space: pre-line; }
  #questions button { margin: .25rem .5rem .25rem 0; }
</style>
</head>
<body>
<h1>Image Captioning &amp; Q&amp;A</h1>

<input id="file" type="file" accept="image/jpeg,image/png">
<div id="status" class="notice info">Please upload an image to get started.</div>

<img id="preview" alt="Uploaded Image">
<p id="caption"></p>

<section id="qa" hidden>
  <h3>Ask questions about the caption:</h3>
  <div id="questions"></div>
  <div id="answer" class="notice answer" hidden></div>
</section>

<script>
let sessionId = null;
const $ = (id) => document.getElementById(id);

function setBusy(busy) {
  $("file").disabled = busy;
  document.querySelectorAll("#questions button").forEach((b) => (b.disabled = busy));
}

function showStatus(text, kind) {
  const el = $("status");
  el.textContent = text;
  el.className = "notice " + kind;
  el.hidden = !text;
}

async function call(method, path, body) {
  const res = await fetch(path, { method, body });
  const data = res.status === 204 ? {} : await res.json();
  if (!res.ok) throw new Error(data.error || res.statusText);
  return data;
}

function render(view) {
  const hasCaption = !!view.caption;
  $("preview").style.display = view.has_image ? "block" : "none";
  if (view.has_image) $("preview").src = `/api/sessions/${sessionId}/image?t=${Date.now()}`;
  $("caption").innerHTML = hasCaption
    ? "<strong>Caption generated by the captioning model:</strong> "
    : "";
  if (hasCaption) $("caption").append(view.caption);
  $("qa").hidden = !hasCaption;
  $("answer").hidden = true;

  const list = $("questions");
  list.replaceChildren();
  view.questions.forEach((q) => {
    const button = document.createElement("button");
    button.textContent = q.text;
    button.onclick = () => ask(q.index);
    list.append(button);
  });
}

async function upload(file) {
  const form = new FormData();
  form.append("image", file);
  setBusy(true);
  showStatus("Generating caption...", "info");
  try {
    render(await call("POST", `/api/sessions/${sessionId}/image`, form));
    showStatus("", "info");
  } catch (e) {
    render(await call("GET", `/api/sessions/${sessionId}`));
    showStatus(e.message, "error");
  } finally {
    setBusy(false);
  }
}

async function ask(index) {
  setBusy(true);
  showStatus("Getting answer...", "info");
  try {
    const res = await call("POST", `/api/sessions/${sessionId}/questions/${index}`);
    const answer = res.found ? res.answer : "(no answer found in the caption)";
    $("answer").textContent = `Q: ${res.question.text}\n\nA: ${answer} (score ${res.score.toFixed(3)})`;
    $("answer").hidden = false;
    showStatus("", "info");
  } catch (e) {
    showStatus(e.message, "error");
  } finally {
    setBusy(false);
  }
}

$("file").addEventListener("change", (e) => {
  if (e.target.files.length) upload(e.target.files[0]);
});

call("POST", "/api/sessions")
  .then((view) => { sessionId = view.session_id; render(view); })
  .catch((e) => showStatus(e.message, "error"));
</script>
</body>
</html>
"##;
