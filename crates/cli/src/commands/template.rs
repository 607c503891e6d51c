use carousel_sync_core::SessionParams;
use carousel_sync_core::config::PlayerSettings;

/// HTML-escape a string to prevent XSS attacks
///
/// Escapes: & < > " '
pub fn html_escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#x27;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

/// Generate the carousel page for one session.
///
/// Slides are not rendered here; `player.js` fetches `/api/media` and builds
/// them so a failed load can be reported to the viewer.
///
/// # Arguments
///
/// * `settings` - Player settings from media.toml
/// * `params` - Role and media filter parsed from the page URL
pub fn generate_html(settings: &PlayerSettings, params: &SessionParams) -> String {
    let is_master = params.role.is_master();
    let escaped_title = html_escape(&settings.title);

    let master_controls = if is_master {
        r#"<div class="master-controls">
            <button id="prev-btn" type="button">&#9664;</button>
            <button id="play-btn" type="button">Play</button>
            <button id="next-btn" type="button">&#9654;</button>
        </div>"#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #0b0b0f;
            color: #eee;
            overflow: hidden;
        }}
        .carousel {{
            position: relative;
            width: 100vw;
            height: 100vh;
            overflow: hidden;
        }}
        .carousel-track {{
            display: flex;
            height: 100%;
            transition: transform 0.45s ease;
        }}
        .slide {{
            flex: 0 0 100%;
            display: flex;
            align-items: center;
            justify-content: center;
            flex-direction: column;
            gap: 1rem;
        }}
        .slide video {{
            max-width: 80vw;
            max-height: 75vh;
            border-radius: 8px;
            box-shadow: 0 8px 32px rgba(0,0,0,0.6);
        }}
        .slide-title {{
            font-size: 1.1rem;
            color: #aaa;
        }}
        .play-indicator {{
            position: fixed;
            top: 1rem;
            right: 1rem;
            padding: 0.4rem 0.8rem;
            border-radius: 4px;
            background: rgba(255,255,255,0.1);
            font-size: 0.85rem;
            text-transform: uppercase;
            letter-spacing: 0.05em;
        }}
        .play-indicator.playing {{
            background: #ff6b35;
            color: white;
        }}
        .master-controls {{
            position: fixed;
            bottom: 1.5rem;
            left: 50%;
            transform: translateX(-50%);
            display: flex;
            gap: 0.75rem;
        }}
        .master-controls button {{
            background: rgba(255,255,255,0.12);
            color: white;
            border: none;
            border-radius: 4px;
            padding: 0.6rem 1.2rem;
            font-size: 1rem;
            cursor: pointer;
        }}
        .master-controls button:hover {{
            background: #ff6b35;
        }}
    </style>
</head>
<body data-role="{role}" data-media="{media}" data-reconnect-ms="{reconnect}">
    <div class="carousel">
        <div class="carousel-track" id="carousel-track"></div>
    </div>
    <div class="play-indicator" id="play-indicator">paused</div>
    {controls}
    <script src="/player.js"></script>
</body>
</html>"#,
        title = escaped_title,
        role = params.role,
        media = html_escape(&params.media.to_string()),
        reconnect = settings.reconnect_delay_ms,
        controls = master_controls,
    )
}

/// Client script: builds slides, drives videos and speaks the sync protocol
pub fn generate_player_js() -> &'static str {
    r#"// Carousel player with master/slave slide synchronization
class SyncChannel {
    constructor(onMessage, onOpen, reconnectMs) {
        this.onMessage = onMessage;
        this.onOpen = onOpen;
        this.reconnectMs = reconnectMs;
        this.socket = null;
        this.connect();
    }

    connect() {
        const scheme = location.protocol === 'https:' ? 'wss:' : 'ws:';
        const query = location.search || '';
        this.socket = new WebSocket(`${scheme}//${location.host}/ws${query}`);

        this.socket.addEventListener('open', () => this.onOpen());

        this.socket.addEventListener('message', (event) => {
            let message;
            try {
                message = JSON.parse(event.data);
            } catch (err) {
                console.warn('Dropping malformed sync frame:', event.data);
                return;
            }
            this.onMessage(message);
        });

        this.socket.addEventListener('close', () => {
            console.warn(`Sync channel closed, reconnecting in ${this.reconnectMs}ms`);
            setTimeout(() => this.connect(), this.reconnectMs);
        });
    }

    send(message) {
        if (this.socket && this.socket.readyState === WebSocket.OPEN) {
            this.socket.send(JSON.stringify(message));
        }
    }

    sendSlideChange(index) {
        this.send({ type: 'slideChange', index });
    }

    sendPlayState(isPlaying) {
        this.send({ type: 'playState', isPlaying });
    }
}

class PlayIndicator {
    constructor(el) {
        this.el = el;
    }

    update(state) {
        this.el.textContent = state.isPlaying ? 'playing' : 'paused';
        this.el.classList.toggle('playing', state.isPlaying);
    }
}

class MasterControls {
    constructor(player) {
        this.playBtn = document.getElementById('play-btn');
        if (!this.playBtn) return;

        document.getElementById('prev-btn').addEventListener('click', () => player.prev());
        document.getElementById('next-btn').addEventListener('click', () => player.next());
        this.playBtn.addEventListener('click', () => player.togglePlay());
    }

    updatePlayPauseButton(isPlaying) {
        if (this.playBtn) {
            this.playBtn.textContent = isPlaying ? 'Pause' : 'Play';
        }
    }
}

class CarouselPlayer {
    constructor(items) {
        const body = document.body;
        this.state = {
            isMaster: body.dataset.role === 'master',
            items,
            currentSlideIndex: 0,
            isPlaying: false,
        };

        this.track = document.getElementById('carousel-track');
        this.indicator = new PlayIndicator(document.getElementById('play-indicator'));
        this.controls = new MasterControls(this);
        this.slides = this.buildSlides(items);
        this.channel = new SyncChannel(
            (message) => this.handleMessage(message),
            () => this.onConnected(),
            Number(body.dataset.reconnectMs) || 2000
        );

        if (this.state.isMaster) {
            document.addEventListener('keydown', (e) => {
                if (e.code === 'ArrowLeft') this.prev();
                else if (e.code === 'ArrowRight') this.next();
                else if (e.code === 'Space') {
                    e.preventDefault();
                    this.togglePlay();
                }
            });
        }

        this.activate(0, false);
    }

    buildSlides(items) {
        this.track.innerHTML = '';
        return items.map((item) => {
            const slide = document.createElement('div');
            slide.className = 'slide';

            const video = document.createElement('video');
            video.loop = true;
            video.muted = true;
            video.playsInline = true;
            video.src = item.video_url;
            if (item.poster) video.poster = item.poster;
            slide.appendChild(video);

            if (item.title) {
                const title = document.createElement('div');
                title.className = 'slide-title';
                title.textContent = item.title;
                slide.appendChild(title);
            }

            this.track.appendChild(slide);
            return { slide, video };
        });
    }

    slideToLoop(index, local) {
        if (this.slides.length === 0) return;
        const target = ((index % this.slides.length) + this.slides.length) % this.slides.length;
        if (target === this.state.currentSlideIndex) return;
        this.activate(target, local);
    }

    activate(index, local) {
        if (this.slides.length === 0) {
            this.indicator.update(this.state);
            return;
        }

        this.state.currentSlideIndex = index;
        this.track.style.transform = `translateX(-${index * 100}%)`;

        this.slides.forEach(({ video }, i) => {
            if (i !== index) {
                video.pause();
                video.currentTime = 0;
            }
        });

        this.slides[index].video.play().catch((err) => {
            console.warn('Video playback did not start:', err);
        });

        this.indicator.update(this.state);
        this.controls.updatePlayPauseButton(this.state.isPlaying);

        if (local && this.state.isMaster) {
            this.channel.sendSlideChange(index);
        }
    }

    // Frames sent while the socket was down are lost, so a master
    // announces where it is on every (re)connect. Slaves get a replay.
    onConnected() {
        if (!this.state.isMaster || this.slides.length === 0) return;
        this.channel.sendSlideChange(this.state.currentSlideIndex);
        this.channel.sendPlayState(this.state.isPlaying);
    }

    next() {
        this.slideToLoop(this.state.currentSlideIndex + 1, true);
    }

    prev() {
        this.slideToLoop(this.state.currentSlideIndex - 1, true);
    }

    togglePlay() {
        if (!this.state.isMaster) return;
        this.applyPlayState(!this.state.isPlaying);
        this.channel.sendPlayState(this.state.isPlaying);
    }

    applyPlayState(isPlaying) {
        this.state.isPlaying = isPlaying;
        const active = this.slides[this.state.currentSlideIndex];
        if (active) {
            if (isPlaying) {
                active.video.play().catch((err) => console.warn('Video playback did not resume:', err));
            } else {
                active.video.pause();
            }
        }
        this.indicator.update(this.state);
        this.controls.updatePlayPauseButton(isPlaying);
    }

    handleMessage(message) {
        switch (message.type) {
            case 'slideChange':
                if (Number.isInteger(message.index) && message.index >= 0) {
                    this.slideToLoop(message.index, false);
                }
                break;
            case 'playState':
                if (typeof message.isPlaying === 'boolean') {
                    this.applyPlayState(message.isPlaying);
                }
                break;
            case 'reload':
                location.reload();
                break;
            default:
                console.warn('Ignoring unknown sync message:', message);
        }
    }
}

async function main() {
    try {
        const media = document.body.dataset.media || 'album';
        const response = await fetch(`/api/media?media=${encodeURIComponent(media)}`);
        if (!response.ok) {
            throw new Error(await response.text());
        }
        const items = await response.json();
        window.carouselPlayer = new CarouselPlayer(items);
    } catch (error) {
        console.error('Initialization failed:', error);
        alert(`Failed to load album videos: ${error.message}`);
    }
}

if (document.readyState === 'loading') {
    document.addEventListener('DOMContentLoaded', main);
} else {
    main();
}
"#
}
